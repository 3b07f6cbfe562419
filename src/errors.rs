use thiserror::Error;

use crate::messages::{MessageKey, MessageParams};
use crate::storage::StoreError;

/// Broad failure classes reported to the initiating player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    Unavailable,
    StorageFailure,
}

/// Failures of player-initiated operations.
#[derive(Debug, Error)]
pub enum HomesError {
    #[error("home not found: {name}")]
    HomeNotFound { name: String },

    #[error("player not found: {name}")]
    PlayerNotFound { name: String },

    /// Receiver has nothing pending.
    #[error("no pending teleport request")]
    NoPendingRequest,

    /// Sender has nothing pending with this receiver.
    #[error("no pending teleport request to {receiver}")]
    NoRequestToTarget { receiver: String },

    #[error("no previous location recorded")]
    NoLastLocation,

    #[error("home already exists: {name}")]
    HomeExists { name: String },

    #[error("home limit of {limit} reached")]
    HomeLimitReached { limit: u32 },

    #[error("a teleport is already in progress")]
    TeleportInProgress,

    /// The other party of an accepted request is already counting down.
    #[error("{player} already has a teleport in progress")]
    TravelerBusy { player: String },

    #[error("cannot send a teleport request to yourself")]
    SelfRequest,

    #[error("home {name} is private")]
    PrivateHome { name: String },

    #[error("{player} is not accepting teleport requests")]
    RequestsDisabled { player: String },

    #[error("{player} is ignoring your teleport requests")]
    Ignored { player: String },

    #[error("teleport request cooldown: {seconds}s remaining")]
    Cooldown { seconds: i64 },

    #[error("feature disabled: {0}")]
    FeatureDisabled(Feature),

    /// Traveler or destination player left between request and execution.
    #[error("teleport target unavailable")]
    TargetUnavailable,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Switchable features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Tpa,
    Back,
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feature::Tpa => f.write_str("tpa"),
            Feature::Back => f.write_str("back"),
        }
    }
}

impl HomesError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HomesError::HomeNotFound { .. }
            | HomesError::PlayerNotFound { .. }
            | HomesError::NoPendingRequest
            | HomesError::NoRequestToTarget { .. }
            | HomesError::NoLastLocation => ErrorKind::NotFound,
            HomesError::HomeExists { .. }
            | HomesError::HomeLimitReached { .. }
            | HomesError::TeleportInProgress
            | HomesError::TravelerBusy { .. }
            | HomesError::SelfRequest => ErrorKind::Conflict,
            HomesError::PrivateHome { .. }
            | HomesError::RequestsDisabled { .. }
            | HomesError::Ignored { .. }
            | HomesError::Cooldown { .. }
            | HomesError::FeatureDisabled(_) => ErrorKind::Unauthorized,
            HomesError::TargetUnavailable => ErrorKind::Unavailable,
            HomesError::Storage(_) => ErrorKind::StorageFailure,
        }
    }

    pub fn message_key(&self) -> MessageKey {
        match self {
            HomesError::HomeNotFound { .. } => MessageKey::HomeNotFound,
            HomesError::PlayerNotFound { .. } => MessageKey::PlayerNotFound,
            HomesError::NoPendingRequest => MessageKey::TpaNoRequest,
            HomesError::NoRequestToTarget { .. } => MessageKey::TpaNoTargetRequest,
            HomesError::NoLastLocation => MessageKey::BackNoLocation,
            HomesError::HomeExists { .. } => MessageKey::HomeExists,
            HomesError::HomeLimitReached { .. } => MessageKey::HomeLimitReached,
            HomesError::TeleportInProgress => MessageKey::TeleportAlreadyInProgress,
            HomesError::TravelerBusy { .. } => MessageKey::TpaTravelerBusy,
            HomesError::SelfRequest => MessageKey::TpaSelf,
            HomesError::PrivateHome { .. } => MessageKey::HomePrivate,
            HomesError::RequestsDisabled { .. } => MessageKey::TpaDisabled,
            HomesError::Ignored { .. } => MessageKey::TpaIgnored,
            HomesError::Cooldown { .. } => MessageKey::TpaCooldown,
            HomesError::FeatureDisabled(Feature::Tpa) => MessageKey::TpaFeatureDisabled,
            HomesError::FeatureDisabled(Feature::Back) => MessageKey::BackFeatureDisabled,
            HomesError::TargetUnavailable => MessageKey::PlayerNotFound,
            HomesError::Storage(_) => MessageKey::StorageUnavailable,
        }
    }

    /// Substitutions for the message; never includes internal error text.
    pub fn message_params(&self) -> MessageParams {
        match self {
            HomesError::HomeNotFound { name }
            | HomesError::HomeExists { name }
            | HomesError::PrivateHome { name } => MessageParams::new().with("name", name),
            HomesError::PlayerNotFound { name } => MessageParams::new().with("player", name),
            HomesError::NoRequestToTarget { receiver } => {
                MessageParams::new().with("player", receiver)
            }
            HomesError::RequestsDisabled { player }
            | HomesError::Ignored { player }
            | HomesError::TravelerBusy { player } => {
                MessageParams::new().with("player", player)
            }
            HomesError::HomeLimitReached { limit } => MessageParams::new().with("limit", limit),
            HomesError::Cooldown { seconds } => MessageParams::new().with("seconds", seconds),
            _ => MessageParams::new(),
        }
    }
}
