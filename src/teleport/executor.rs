//! Cancellable delayed teleports.
//!
//! Each traveler is either idle or counting down. A countdown is advanced by
//! [`DelayedTeleportExecutor::tick`], which the host calls from its game loop:
//!
//! ```text
//! IDLE --begin--> COUNTDOWN(n) --tick--> COUNTDOWN(n-1) ... COUNTDOWN(0) --tick--> COMPLETE
//!                      |                                                       |
//!                      +-- moved / disconnected / cancelled --> CANCELLED      |
//!                      (every terminal state drops the entry and is IDLE again) <+
//! ```
//!
//! The first tick runs inside `begin`, so a zero-second delay teleports at once.
//! A countdown owns no timer: removing its entry is all it takes to stop it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use super::last_location::LastLocationStore;
use crate::config::TeleportConfig;
use crate::errors::HomesError;
use crate::homes::{Location, PlayerId};
use crate::messages::{MessageKey, MessageParams};
use crate::world::{Notifier, World};

/// Where a delayed teleport ends up. Player targets are resolved when the
/// countdown finishes, so a moving target is followed.
#[derive(Debug, Clone, PartialEq)]
pub enum TeleportTarget {
    Location(Location),
    Player(PlayerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Moved,
    Disconnected,
    /// Destination player went offline before the countdown finished.
    TargetUnavailable,
    /// Host refused the relocation.
    Refused,
    Explicit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TeleportOutcome {
    Completed {
        traveler: PlayerId,
        destination: Location,
    },
    Cancelled {
        traveler: PlayerId,
        reason: CancelReason,
    },
}

#[derive(Debug, Clone)]
struct Countdown {
    origin: Location,
    target: TeleportTarget,
    remaining: u32,
    next_tick_at: DateTime<Utc>,
}

pub struct DelayedTeleportExecutor {
    pending: HashMap<PlayerId, Countdown>,
    config: TeleportConfig,
    world: Arc<dyn World>,
    notifier: Arc<dyn Notifier>,
}

impl DelayedTeleportExecutor {
    pub fn new(config: TeleportConfig, world: Arc<dyn World>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pending: HashMap::new(),
            config,
            world,
            notifier,
        }
    }

    pub fn is_pending(&self, traveler: PlayerId) -> bool {
        self.pending.contains_key(&traveler)
    }

    /// Seconds left on the traveler's countdown.
    pub fn remaining(&self, traveler: PlayerId) -> Option<u32> {
        self.pending.get(&traveler).map(|c| c.remaining)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Start a countdown for `traveler`.
    ///
    /// Rejected with [`HomesError::TeleportInProgress`] if one is already
    /// running; the running countdown is left untouched. Otherwise the
    /// traveler's current position is recorded in `last` and becomes the
    /// movement baseline.
    pub fn begin(
        &mut self,
        traveler: PlayerId,
        target: TeleportTarget,
        last: &mut LastLocationStore,
        now: DateTime<Utc>,
    ) -> Result<(), HomesError> {
        if self.pending.contains_key(&traveler) {
            return Err(HomesError::TeleportInProgress);
        }
        let origin = self
            .world
            .position(traveler)
            .ok_or(HomesError::TargetUnavailable)?;
        last.record(traveler, origin.clone());

        let seconds = self.config.delay_seconds;
        self.notifier.notify(
            traveler,
            MessageKey::TeleportStart,
            &MessageParams::new().with("seconds", seconds),
        );
        debug!("countdown of {}s started for {}", seconds, traveler);
        self.pending.insert(
            traveler,
            Countdown {
                origin,
                target,
                remaining: seconds,
                next_tick_at: now,
            },
        );
        self.advance(traveler, now);
        Ok(())
    }

    /// Advance every countdown that is due.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TeleportOutcome> {
        let due: Vec<PlayerId> = self
            .pending
            .iter()
            .filter(|(_, c)| c.next_tick_at <= now)
            .map(|(id, _)| *id)
            .collect();
        due.into_iter()
            .filter_map(|traveler| self.advance(traveler, now))
            .collect()
    }

    fn advance(&mut self, traveler: PlayerId, now: DateTime<Utc>) -> Option<TeleportOutcome> {
        let countdown = self.pending.get(&traveler)?;

        let position = if self.world.is_online(traveler) {
            self.world.position(traveler)
        } else {
            None
        };
        let Some(position) = position else {
            self.pending.remove(&traveler);
            debug!("countdown for {} dropped: traveler offline", traveler);
            return Some(TeleportOutcome::Cancelled {
                traveler,
                reason: CancelReason::Disconnected,
            });
        };

        if countdown
            .origin
            .moved_beyond(&position, self.config.movement_tolerance)
        {
            return self.cancel_with(traveler, CancelReason::Moved);
        }

        if countdown.remaining == 0 {
            let countdown = self.pending.remove(&traveler)?;
            return Some(self.complete(traveler, countdown.target));
        }

        let interval = self.config.tick_interval();
        let countdown = self.pending.get_mut(&traveler)?;
        self.notifier.notify(
            traveler,
            MessageKey::TeleportCountdown,
            &MessageParams::new().with("seconds", countdown.remaining),
        );
        countdown.remaining -= 1;
        countdown.next_tick_at += interval;
        if countdown.next_tick_at <= now {
            countdown.next_tick_at = now + interval;
        }
        None
    }

    fn complete(&mut self, traveler: PlayerId, target: TeleportTarget) -> TeleportOutcome {
        let destination = match target {
            TeleportTarget::Location(location) => Some(location),
            TeleportTarget::Player(other) if self.world.is_online(other) => self.world.position(other),
            TeleportTarget::Player(_) => None,
        };
        let Some(destination) = destination else {
            self.notifier.notify(
                traveler,
                MessageKey::TeleportTargetUnavailable,
                &MessageParams::new(),
            );
            return TeleportOutcome::Cancelled {
                traveler,
                reason: CancelReason::TargetUnavailable,
            };
        };
        if !self.world.relocate(traveler, &destination) {
            self.notifier
                .notify(traveler, MessageKey::TeleportCancelled, &MessageParams::new());
            return TeleportOutcome::Cancelled {
                traveler,
                reason: CancelReason::Refused,
            };
        }
        info!("teleported {} to {}", traveler, destination);
        self.notifier
            .notify(traveler, MessageKey::TeleportSuccess, &MessageParams::new());
        TeleportOutcome::Completed {
            traveler,
            destination,
        }
    }

    fn cancel_with(&mut self, traveler: PlayerId, reason: CancelReason) -> Option<TeleportOutcome> {
        self.pending.remove(&traveler)?;
        debug!("countdown for {} cancelled: {:?}", traveler, reason);
        self.notifier
            .notify(traveler, MessageKey::TeleportCancelled, &MessageParams::new());
        Some(TeleportOutcome::Cancelled { traveler, reason })
    }

    /// Movement event from the host. Cancels the countdown when the traveler
    /// has left the tolerance around its starting point.
    pub fn on_player_moved(&mut self, traveler: PlayerId, to: &Location) -> Option<TeleportOutcome> {
        let countdown = self.pending.get(&traveler)?;
        if countdown
            .origin
            .moved_beyond(to, self.config.movement_tolerance)
        {
            self.cancel_with(traveler, CancelReason::Moved)
        } else {
            None
        }
    }

    /// Traveler left; drop the countdown without notifying anyone.
    pub fn on_presence_end(&mut self, traveler: PlayerId) -> bool {
        let removed = self.pending.remove(&traveler).is_some();
        if removed {
            debug!("countdown for {} dropped on disconnect", traveler);
        }
        removed
    }

    /// Explicit cancel requested by the traveler.
    pub fn cancel(&mut self, traveler: PlayerId) -> Option<TeleportOutcome> {
        self.cancel_with(traveler, CancelReason::Explicit)
    }
}
