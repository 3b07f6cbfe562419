use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;

use super::executor::{DelayedTeleportExecutor, TeleportTarget};
use crate::errors::{Feature, HomesError};
use crate::homes::{Location, PlayerId};

/// Most recent pre-teleport location per player, for "return".
///
/// Session-only; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct LastLocationStore {
    enabled: bool,
    locations: HashMap<PlayerId, Location>,
}

impl LastLocationStore {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            locations: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Overwrite the player's last location. No-op while disabled.
    pub fn record(&mut self, player: PlayerId, location: Location) {
        if !self.enabled {
            return;
        }
        debug!("last location of {} is now {}", player, location);
        self.locations.insert(player, location);
    }

    pub fn peek(&self, player: PlayerId) -> Option<&Location> {
        self.locations.get(&player)
    }

    pub fn forget(&mut self, player: PlayerId) -> Option<Location> {
        self.locations.remove(&player)
    }

    /// Start a delayed teleport back to the stored location.
    ///
    /// The executor snapshots the traveler's current position into this store
    /// when the countdown begins, so calling this twice in a row swaps the
    /// player back and forth between two places.
    pub fn swap_and_return(
        &mut self,
        player: PlayerId,
        executor: &mut DelayedTeleportExecutor,
        now: DateTime<Utc>,
    ) -> Result<(), HomesError> {
        if !self.enabled {
            return Err(HomesError::FeatureDisabled(Feature::Back));
        }
        let destination = self.peek(player).cloned().ok_or(HomesError::NoLastLocation)?;
        executor.begin(player, TeleportTarget::Location(destination), self, now)
    }
}

impl Default for LastLocationStore {
    fn default() -> Self {
        Self::new(true)
    }
}
