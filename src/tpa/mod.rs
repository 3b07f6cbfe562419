//! Consensual player-to-player teleport requests.

pub mod ledger;

pub use ledger::{RequestDirection, TeleportRequest, TeleportRequestLedger};
