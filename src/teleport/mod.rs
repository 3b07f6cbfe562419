//! Delayed teleports and the "return" location they leave behind.

pub mod executor;
pub mod last_location;

pub use executor::{CancelReason, DelayedTeleportExecutor, TeleportOutcome, TeleportTarget};
pub use last_location::LastLocationStore;
