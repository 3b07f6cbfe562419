//! Home data model and the write-through [`HomeRegistry`].

pub mod registry;
pub mod types;

pub use registry::HomeRegistry;
pub use types::{Home, Location, PlayerId};
