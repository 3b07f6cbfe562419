//! Teleport request ledger.
//!
//! Tracks pending player-to-player teleport requests and the session-only
//! state that gates them:
//! - per-sender cooldown between successful requests
//! - per-receiver ignore lists
//! - a per-player "not accepting requests" switch
//! - expiry of requests nobody answered
//!
//! Requests are keyed by `(receiver, sender)`, so a receiver holds at most one
//! request per sender and a repeated request replaces the older one. Every
//! terminal transition (accept, deny, cancel, expire) removes the record.
//!
//! When a receiver answers without naming a sender, the most recently created
//! request wins (creation time, then insertion order).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::TpaConfig;
use crate::errors::{Feature, HomesError};
use crate::homes::PlayerId;
use crate::messages::{MessageKey, MessageParams};
use crate::teleport::{DelayedTeleportExecutor, LastLocationStore, TeleportTarget};
use crate::world::{name_of, Notifier, World};

/// Who travels when a request is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDirection {
    /// Sender travels to the receiver.
    ComeTo,
    /// Receiver travels to the sender.
    BringHere,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeleportRequest {
    pub sender: PlayerId,
    pub receiver: PlayerId,
    pub direction: RequestDirection,
    pub created_at: DateTime<Utc>,
    /// Ledger-wide insertion counter; breaks ties between equal timestamps.
    pub sequence: u64,
}

impl TeleportRequest {
    /// `(traveler, destination player)` for this request.
    pub fn route(&self) -> (PlayerId, PlayerId) {
        match self.direction {
            RequestDirection::ComeTo => (self.sender, self.receiver),
            RequestDirection::BringHere => (self.receiver, self.sender),
        }
    }
}

pub struct TeleportRequestLedger {
    /// receiver -> sender -> request
    requests: HashMap<PlayerId, HashMap<PlayerId, TeleportRequest>>,
    cooldowns: HashMap<PlayerId, DateTime<Utc>>,
    /// receiver -> senders they ignore
    ignored: HashMap<PlayerId, HashSet<PlayerId>>,
    opted_out: HashSet<PlayerId>,
    next_sequence: u64,
    config: TpaConfig,
    world: Arc<dyn World>,
    notifier: Arc<dyn Notifier>,
}

impl TeleportRequestLedger {
    pub fn new(config: TpaConfig, world: Arc<dyn World>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            requests: HashMap::new(),
            cooldowns: HashMap::new(),
            ignored: HashMap::new(),
            opted_out: HashSet::new(),
            next_sequence: 0,
            config,
            world,
            notifier,
        }
    }

    fn ensure_enabled(&self) -> Result<(), HomesError> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(HomesError::FeatureDisabled(Feature::Tpa))
        }
    }

    fn tell(&self, player: PlayerId, key: MessageKey, params: MessageParams) {
        self.notifier.notify(player, key, &params);
    }

    fn tell_if_online(&self, player: PlayerId, key: MessageKey, params: MessageParams) {
        if self.world.is_online(player) {
            self.tell(player, key, params);
        }
    }

    /// Seconds of cooldown left for `sender`, if any.
    pub fn cooldown_remaining(&self, sender: PlayerId, now: DateTime<Utc>) -> Option<i64> {
        let last = self.cooldowns.get(&sender)?;
        let left = *last + self.config.cooldown() - now;
        let millis = left.num_milliseconds();
        (millis > 0).then(|| (millis + 999) / 1000)
    }

    /// Create or replace the pending request from `sender` to `receiver`.
    ///
    /// Checks run in order: feature switch, self-request, receiver online,
    /// sender cooldown, receiver opt-out, receiver ignore list. A rejected
    /// send changes nothing.
    pub fn send_request(
        &mut self,
        sender: PlayerId,
        receiver: PlayerId,
        direction: RequestDirection,
        now: DateTime<Utc>,
    ) -> Result<(), HomesError> {
        self.ensure_enabled()?;
        if sender == receiver {
            return Err(HomesError::SelfRequest);
        }
        let receiver_name = name_of(self.world.as_ref(), receiver);
        if !self.world.is_online(receiver) {
            return Err(HomesError::PlayerNotFound { name: receiver_name });
        }
        if let Some(seconds) = self.cooldown_remaining(sender, now) {
            return Err(HomesError::Cooldown { seconds });
        }
        if self.opted_out.contains(&receiver) {
            return Err(HomesError::RequestsDisabled {
                player: receiver_name,
            });
        }
        if self.is_ignored(receiver, sender) {
            return Err(HomesError::Ignored {
                player: receiver_name,
            });
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let replaced = self.requests.entry(receiver).or_default().insert(
            sender,
            TeleportRequest {
                sender,
                receiver,
                direction,
                created_at: now,
                sequence,
            },
        );
        self.cooldowns.insert(sender, now);
        if replaced.is_some() {
            debug!("request {} -> {} replaced an older one", sender, receiver);
        }
        info!("teleport request {} -> {} ({:?})", sender, receiver, direction);

        let sender_name = name_of(self.world.as_ref(), sender);
        self.tell(
            sender,
            MessageKey::TpaSent,
            MessageParams::new().with("player", &receiver_name),
        );
        let received = match direction {
            RequestDirection::ComeTo => MessageKey::TpaReceived,
            RequestDirection::BringHere => MessageKey::TpaHereReceived,
        };
        self.tell(
            receiver,
            received,
            MessageParams::new().with("player", &sender_name),
        );
        Ok(())
    }

    /// Pending requests addressed to `receiver`, newest first.
    pub fn pending_for(&self, receiver: PlayerId) -> Vec<TeleportRequest> {
        let mut pending: Vec<TeleportRequest> = self
            .requests
            .get(&receiver)
            .map(|by_sender| by_sender.values().cloned().collect())
            .unwrap_or_default();
        pending.sort_by(|a, b| (b.created_at, b.sequence).cmp(&(a.created_at, a.sequence)));
        pending
    }

    pub fn pending_request(&self, receiver: PlayerId, sender: PlayerId) -> Option<&TeleportRequest> {
        self.requests.get(&receiver)?.get(&sender)
    }

    pub fn pending_count(&self) -> usize {
        self.requests.values().map(HashMap::len).sum()
    }

    fn latest_sender(&self, receiver: PlayerId) -> Option<PlayerId> {
        self.requests
            .get(&receiver)?
            .values()
            .max_by_key(|r| (r.created_at, r.sequence))
            .map(|r| r.sender)
    }

    fn take(&mut self, receiver: PlayerId, sender: PlayerId) -> Option<TeleportRequest> {
        let by_sender = self.requests.get_mut(&receiver)?;
        let request = by_sender.remove(&sender);
        if by_sender.is_empty() {
            self.requests.remove(&receiver);
        }
        request
    }

    /// Accept the newest request addressed to `receiver`. Returns the sender.
    pub fn accept_request(
        &mut self,
        receiver: PlayerId,
        executor: &mut DelayedTeleportExecutor,
        last: &mut LastLocationStore,
        now: DateTime<Utc>,
    ) -> Result<PlayerId, HomesError> {
        self.ensure_enabled()?;
        let sender = self
            .latest_sender(receiver)
            .ok_or(HomesError::NoPendingRequest)?;
        self.accept_request_from(receiver, sender, executor, last, now)
    }

    /// Accept the request `sender` sent to `receiver` and start the countdown.
    ///
    /// The record is consumed even when the countdown cannot start. If the
    /// traveler is the sender and already counting down, the sender is told
    /// and the receiver gets [`HomesError::TravelerBusy`].
    pub fn accept_request_from(
        &mut self,
        receiver: PlayerId,
        sender: PlayerId,
        executor: &mut DelayedTeleportExecutor,
        last: &mut LastLocationStore,
        now: DateTime<Utc>,
    ) -> Result<PlayerId, HomesError> {
        self.ensure_enabled()?;
        let request = self
            .take(receiver, sender)
            .ok_or(HomesError::NoPendingRequest)?;
        if !self.world.is_online(sender) {
            debug!("request {} -> {} accepted after sender left", sender, receiver);
            return Err(HomesError::TargetUnavailable);
        }

        let (traveler, destination) = request.route();
        let traveler_name = name_of(self.world.as_ref(), traveler);
        match executor.begin(traveler, TeleportTarget::Player(destination), last, now) {
            Err(HomesError::TeleportInProgress) if traveler != receiver => {
                debug!("request {} -> {} accepted while {} is counting down", sender, receiver, traveler);
                self.tell(
                    traveler,
                    MessageKey::TeleportAlreadyInProgress,
                    MessageParams::new().with("player", name_of(self.world.as_ref(), receiver)),
                );
                return Err(HomesError::TravelerBusy {
                    player: traveler_name,
                });
            }
            result => result?,
        }
        info!("teleport request {} -> {} accepted", sender, receiver);

        self.tell(traveler, MessageKey::TpaAccepted, MessageParams::new());
        self.tell(
            destination,
            MessageKey::TpaAcceptedTarget,
            MessageParams::new().with("player", traveler_name),
        );
        Ok(sender)
    }

    /// Deny the newest request addressed to `receiver`. Returns the sender.
    pub fn deny_request(&mut self, receiver: PlayerId) -> Result<PlayerId, HomesError> {
        self.ensure_enabled()?;
        let sender = self
            .latest_sender(receiver)
            .ok_or(HomesError::NoPendingRequest)?;
        self.deny_request_from(receiver, sender)
    }

    pub fn deny_request_from(
        &mut self,
        receiver: PlayerId,
        sender: PlayerId,
    ) -> Result<PlayerId, HomesError> {
        self.ensure_enabled()?;
        self.take(receiver, sender)
            .ok_or(HomesError::NoPendingRequest)?;
        debug!("teleport request {} -> {} denied", sender, receiver);
        self.tell(receiver, MessageKey::TpaRequestDenied, MessageParams::new());
        let receiver_name = name_of(self.world.as_ref(), receiver);
        self.tell_if_online(
            sender,
            MessageKey::TpaDeniedSender,
            MessageParams::new().with("player", receiver_name),
        );
        Ok(sender)
    }

    /// Withdraw the request `sender` made to the online player `receiver_name`.
    pub fn cancel_request(&mut self, sender: PlayerId, receiver_name: &str) -> Result<(), HomesError> {
        self.ensure_enabled()?;
        let receiver = self
            .world
            .find_online(receiver_name)
            .ok_or_else(|| HomesError::PlayerNotFound {
                name: receiver_name.to_string(),
            })?;
        self.take(receiver, sender)
            .ok_or_else(|| HomesError::NoRequestToTarget {
                receiver: receiver_name.to_string(),
            })?;
        debug!("teleport request {} -> {} cancelled", sender, receiver);
        self.tell(sender, MessageKey::TpaCancelled, MessageParams::new());
        Ok(())
    }

    /// Remove every request at least `request_ttl` old, notifying both
    /// parties once. Returns the removed requests.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<TeleportRequest> {
        let ttl = self.config.request_ttl();
        let expired: Vec<(PlayerId, PlayerId)> = self
            .requests
            .values()
            .flat_map(HashMap::values)
            .filter(|r| now - r.created_at >= ttl)
            .map(|r| (r.receiver, r.sender))
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for (receiver, sender) in expired {
            let Some(request) = self.take(receiver, sender) else {
                continue;
            };
            debug!("teleport request {} -> {} expired", sender, receiver);
            let sender_name = name_of(self.world.as_ref(), sender);
            let receiver_name = name_of(self.world.as_ref(), receiver);
            self.tell_if_online(
                sender,
                MessageKey::TpaExpiredSender,
                MessageParams::new().with("player", receiver_name),
            );
            self.tell_if_online(
                receiver,
                MessageKey::TpaExpiredReceiver,
                MessageParams::new().with("player", sender_name),
            );
            removed.push(request);
        }
        removed
    }

    pub fn is_accepting(&self, player: PlayerId) -> bool {
        !self.opted_out.contains(&player)
    }

    /// Flip the player's "accepting requests" switch. Returns the new state.
    pub fn toggle_opt_out(&mut self, player: PlayerId) -> Result<bool, HomesError> {
        self.ensure_enabled()?;
        let accepting = !self.is_accepting(player);
        self.set_accepting(player, accepting);
        let key = if accepting {
            MessageKey::TpaToggleOn
        } else {
            MessageKey::TpaToggleOff
        };
        self.tell(player, key, MessageParams::new());
        Ok(accepting)
    }

    pub fn set_accepting(&mut self, player: PlayerId, accepting: bool) {
        if accepting {
            self.opted_out.remove(&player);
        } else {
            self.opted_out.insert(player);
        }
    }

    pub fn is_ignored(&self, receiver: PlayerId, sender: PlayerId) -> bool {
        self.ignored
            .get(&receiver)
            .is_some_and(|set| set.contains(&sender))
    }

    pub fn set_ignored(&mut self, player: PlayerId, other: PlayerId, ignore: bool) {
        if ignore {
            self.ignored.entry(player).or_default().insert(other);
        } else if let Some(set) = self.ignored.get_mut(&player) {
            set.remove(&other);
            if set.is_empty() {
                self.ignored.remove(&player);
            }
        }
    }

    /// Flip whether `player` ignores `other`. Returns true when now ignored.
    pub fn toggle_ignored(&mut self, player: PlayerId, other: PlayerId) -> Result<bool, HomesError> {
        self.ensure_enabled()?;
        let ignore = !self.is_ignored(player, other);
        self.set_ignored(player, other, ignore);
        let key = if ignore {
            MessageKey::TpaIgnoreAdd
        } else {
            MessageKey::TpaIgnoreRemove
        };
        let other_name = name_of(self.world.as_ref(), other);
        self.tell(player, key, MessageParams::new().with("player", other_name));
        Ok(ignore)
    }
}
