//! Message keys handed to the notification collaborator.
//!
//! The core never formats player-facing text. Every success, failure, expiry
//! and countdown event is reported as a [`MessageKey`] plus named
//! [`MessageParams`]; the host looks the key up in its own message table.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    HomeSet,
    HomeUpdated,
    HomeExists,
    HomeNotFound,
    HomeDeleted,
    HomeLimitReached,
    HomePrivate,
    HomeVisibilityChanged,
    PlayerNotFound,
    TpaSent,
    TpaReceived,
    TpaHereReceived,
    TpaCooldown,
    TpaDisabled,
    TpaIgnored,
    TpaSelf,
    TpaNoRequest,
    TpaNoTargetRequest,
    TpaAccepted,
    TpaAcceptedTarget,
    TpaTravelerBusy,
    TpaRequestDenied,
    TpaDeniedSender,
    TpaCancelled,
    TpaExpiredSender,
    TpaExpiredReceiver,
    TpaToggleOn,
    TpaToggleOff,
    TpaIgnoreAdd,
    TpaIgnoreRemove,
    TpaFeatureDisabled,
    TeleportStart,
    TeleportCountdown,
    TeleportSuccess,
    TeleportCancelled,
    TeleportAlreadyInProgress,
    TeleportTargetUnavailable,
    BackSuccess,
    BackNoLocation,
    BackFeatureDisabled,
    StorageUnavailable,
}

impl MessageKey {
    /// Stable key used in host message tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::HomeSet => "home-set",
            MessageKey::HomeUpdated => "home-updated",
            MessageKey::HomeExists => "home-exists",
            MessageKey::HomeNotFound => "home-not-found",
            MessageKey::HomeDeleted => "home-deleted",
            MessageKey::HomeLimitReached => "home-limit-reached",
            MessageKey::HomePrivate => "home-private",
            MessageKey::HomeVisibilityChanged => "home-visibility-changed",
            MessageKey::PlayerNotFound => "player-not-found",
            MessageKey::TpaSent => "tpa-sent",
            MessageKey::TpaReceived => "tpa-received",
            MessageKey::TpaHereReceived => "tpahere-received",
            MessageKey::TpaCooldown => "tpa-cooldown",
            MessageKey::TpaDisabled => "tpa-disabled",
            MessageKey::TpaIgnored => "tpa-ignored",
            MessageKey::TpaSelf => "tpa-self",
            MessageKey::TpaNoRequest => "tpa-no-request",
            MessageKey::TpaNoTargetRequest => "tpa-no-target-request",
            MessageKey::TpaAccepted => "tpa-accepted",
            MessageKey::TpaAcceptedTarget => "tpa-accepted-target",
            MessageKey::TpaTravelerBusy => "tpa-traveler-busy",
            MessageKey::TpaRequestDenied => "tpa-request-denied",
            MessageKey::TpaDeniedSender => "tpa-denied-sender",
            MessageKey::TpaCancelled => "tpa-cancelled",
            MessageKey::TpaExpiredSender => "tpa-expired-sender",
            MessageKey::TpaExpiredReceiver => "tpa-expired-receiver",
            MessageKey::TpaToggleOn => "tpa-toggle-on",
            MessageKey::TpaToggleOff => "tpa-toggle-off",
            MessageKey::TpaIgnoreAdd => "tpa-ignore-add",
            MessageKey::TpaIgnoreRemove => "tpa-ignore-remove",
            MessageKey::TpaFeatureDisabled => "tpa-feature-disabled",
            MessageKey::TeleportStart => "teleport-start",
            MessageKey::TeleportCountdown => "teleport-count",
            MessageKey::TeleportSuccess => "teleport-success",
            MessageKey::TeleportCancelled => "teleport-cancelled",
            MessageKey::TeleportAlreadyInProgress => "teleport-already-in-progress",
            MessageKey::TeleportTargetUnavailable => "teleport-target-unavailable",
            MessageKey::BackSuccess => "back-success",
            MessageKey::BackNoLocation => "back-no-location",
            MessageKey::BackFeatureDisabled => "back-feature-disabled",
            MessageKey::StorageUnavailable => "storage-unavailable",
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named substitutions for a message, e.g. `{player}` or `{seconds}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageParams(Vec<(&'static str, String)>);

impl MessageParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl ToString) -> Self {
        self.0.push((name, value.to_string()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace `{name}` placeholders in `template`.
    pub fn apply(&self, template: &str) -> String {
        self.iter().fold(template.to_string(), |acc, (k, v)| {
            acc.replace(&format!("{{{}}}", k), v)
        })
    }
}
