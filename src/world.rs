//! Interfaces the core consumes from the host game server.
//!
//! The host owns players, their positions and the chat channel. The core only
//! asks questions through [`World`] and reports events through [`Notifier`];
//! both are called from the simulation thread.

use crate::homes::{Location, PlayerId};
use crate::messages::{MessageKey, MessageParams};

pub trait World: Send + Sync {
    /// True while the player is connected.
    fn is_online(&self, player: PlayerId) -> bool;

    /// Current position of an online player.
    fn position(&self, player: PlayerId) -> Option<Location>;

    fn display_name(&self, player: PlayerId) -> Option<String>;

    /// Resolve an online player by name.
    fn find_online(&self, name: &str) -> Option<PlayerId>;

    fn online_players(&self) -> Vec<PlayerId>;

    /// Move the player. Returns false if the host refused.
    fn relocate(&self, player: PlayerId, to: &Location) -> bool;

    /// Admins may visit private homes and get the admin home limit.
    fn is_admin(&self, _player: PlayerId) -> bool {
        false
    }

    /// Per-player home limit granted by the host's permission system.
    fn home_limit(&self, _player: PlayerId) -> Option<u32> {
        None
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, player: PlayerId, key: MessageKey, params: &MessageParams);
}

/// Best-effort display name, falling back to the id.
pub(crate) fn name_of(world: &dyn World, player: PlayerId) -> String {
    world
        .display_name(player)
        .unwrap_or_else(|| player.to_string())
}
