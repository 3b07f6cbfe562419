//! Composition root.
//!
//! [`HomesService`] owns one instance of every component and is the only
//! thing the host talks to. The host pushes presence, movement and death
//! events in through [`HomesService::dispatch`], calls
//! [`HomesService::tick`] from its game loop, and invokes the player
//! operations below from its command layer.
//!
//! Every player operation returns a `Result` for the caller and, on failure,
//! also notifies the initiating player with the error's message key.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::runtime::Handle;

use crate::clock::Clock;
use crate::config::Config;
use crate::errors::{ErrorKind, Feature, HomesError};
use crate::homes::{Home, HomeRegistry, Location, PlayerId};
use crate::logutil::escape_log;
use crate::messages::{MessageKey, MessageParams};
use crate::storage::HomeStore;
use crate::teleport::{DelayedTeleportExecutor, LastLocationStore, TeleportOutcome, TeleportTarget};
use crate::tpa::{RequestDirection, TeleportRequestLedger};
use crate::world::{name_of, Notifier, World};

/// Events pushed in by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    PresenceStart(PlayerId),
    PresenceEnd(PlayerId),
    Moved { player: PlayerId, to: Location },
    Died { player: PlayerId, at: Location },
}

pub struct HomesService {
    config: Config,
    registry: HomeRegistry,
    ledger: TeleportRequestLedger,
    executor: DelayedTeleportExecutor,
    last: LastLocationStore,
    world: Arc<dyn World>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl HomesService {
    pub fn new(
        config: Config,
        store: Arc<dyn HomeStore>,
        world: Arc<dyn World>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        runtime: Handle,
    ) -> Self {
        let registry = HomeRegistry::new(store, runtime);
        let ledger = TeleportRequestLedger::new(config.tpa.clone(), world.clone(), notifier.clone());
        let executor =
            DelayedTeleportExecutor::new(config.teleport.clone(), world.clone(), notifier.clone());
        let last = LastLocationStore::new(config.back.enabled);
        Self {
            config,
            registry,
            ledger,
            executor,
            last,
            world,
            notifier,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &HomeRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &TeleportRequestLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut TeleportRequestLedger {
        &mut self.ledger
    }

    pub fn executor(&self) -> &DelayedTeleportExecutor {
        &self.executor
    }

    pub fn last_locations(&self) -> &LastLocationStore {
        &self.last
    }

    fn tell(&self, player: PlayerId, key: MessageKey, params: MessageParams) {
        self.notifier.notify(player, key, &params);
    }

    /// Forward a failure to the initiating player, then hand it back.
    fn report<T>(&self, player: PlayerId, result: Result<T, HomesError>) -> Result<T, HomesError> {
        if let Err(e) = &result {
            if e.kind() == ErrorKind::StorageFailure {
                warn!("operation for {} hit storage: {}", player, e);
            } else {
                debug!("operation for {} rejected: {}", player, e);
            }
            self.tell(player, e.message_key(), e.message_params());
        }
        result
    }

    pub fn dispatch(&mut self, event: GameEvent) {
        match event {
            GameEvent::PresenceStart(player) => self.registry.load(player),
            GameEvent::PresenceEnd(player) => {
                self.registry.unload(player);
                self.executor.on_presence_end(player);
            }
            GameEvent::Moved { player, to } => {
                self.executor.on_player_moved(player, &to);
            }
            GameEvent::Died { player, at } => {
                if self.config.back.save_death_location {
                    self.last.record(player, at);
                }
            }
        }
    }

    /// Expire stale requests and advance due countdowns.
    pub fn tick(&mut self) -> Vec<TeleportOutcome> {
        let now = self.clock.now();
        let expired = self.ledger.sweep_expired(now);
        if !expired.is_empty() {
            debug!("{} teleport requests expired", expired.len());
        }
        self.executor.tick(now)
    }

    fn home_limit(&self, player: PlayerId) -> u32 {
        self.world.home_limit(player).unwrap_or_else(|| {
            if self.world.is_admin(player) {
                self.config.homes.admin_limit
            } else {
                self.config.homes.default_limit
            }
        })
    }

    fn current_position(&self, player: PlayerId) -> Result<Location, HomesError> {
        self.world
            .position(player)
            .ok_or_else(|| HomesError::PlayerNotFound {
                name: name_of(self.world.as_ref(), player),
            })
    }

    /// Save a new home at the player's position.
    pub fn create_home(&mut self, player: PlayerId, name: &str) -> Result<(), HomesError> {
        let result = self.try_create_home(player, name);
        self.report(player, result)
    }

    fn try_create_home(&mut self, player: PlayerId, name: &str) -> Result<(), HomesError> {
        if self.registry.has_home(player, name) {
            return Err(HomesError::HomeExists {
                name: name.to_string(),
            });
        }
        let limit = self.home_limit(player);
        if self.registry.home_count(player) >= limit as usize {
            return Err(HomesError::HomeLimitReached { limit });
        }
        let here = self.current_position(player)?;
        info!("{} set home {} at {}", player, escape_log(name), here);
        self.registry.set_home(player, name, here);
        self.tell(player, MessageKey::HomeSet, MessageParams::new().with("name", name));
        Ok(())
    }

    /// Move a home to the player's position, creating it if needed.
    pub fn update_home(&mut self, player: PlayerId, name: &str) -> Result<(), HomesError> {
        let result = self.current_position(player).map(|here| {
            info!("{} moved home {} to {}", player, escape_log(name), here);
            self.registry.set_home(player, name, here);
            self.tell(
                player,
                MessageKey::HomeUpdated,
                MessageParams::new().with("name", name),
            );
        });
        self.report(player, result)
    }

    pub fn delete_home(&mut self, player: PlayerId, name: &str) -> Result<(), HomesError> {
        let result = if self.registry.has_home(player, name) {
            self.registry.delete_home(player, name);
            self.tell(
                player,
                MessageKey::HomeDeleted,
                MessageParams::new().with("name", name),
            );
            Ok(())
        } else {
            Err(HomesError::HomeNotFound {
                name: name.to_string(),
            })
        };
        self.report(player, result)
    }

    pub fn set_home_visibility(
        &mut self,
        player: PlayerId,
        name: &str,
        is_public: bool,
    ) -> Result<(), HomesError> {
        let result = if self.registry.has_home(player, name) {
            self.registry.set_public(player, name, is_public);
            let visibility = if is_public { "public" } else { "private" };
            self.tell(
                player,
                MessageKey::HomeVisibilityChanged,
                MessageParams::new()
                    .with("name", name)
                    .with("visibility", visibility),
            );
            Ok(())
        } else {
            Err(HomesError::HomeNotFound {
                name: name.to_string(),
            })
        };
        self.report(player, result)
    }

    /// Start a delayed teleport to one of the player's own homes.
    pub fn teleport_home(&mut self, player: PlayerId, name: &str) -> Result<(), HomesError> {
        let now = self.clock.now();
        let result = match self.registry.get_home(player, name) {
            Some(home) => self
                .executor
                .begin(player, TeleportTarget::Location(home), &mut self.last, now),
            None => Err(HomesError::HomeNotFound {
                name: name.to_string(),
            }),
        };
        self.report(player, result)
    }

    /// Start a delayed teleport to another player's home. Private homes are
    /// open to their owner and to admins only.
    pub fn visit_home(
        &mut self,
        visitor: PlayerId,
        owner: PlayerId,
        name: &str,
    ) -> Result<(), HomesError> {
        let now = self.clock.now();
        let result = match self.registry.get_home(owner, name) {
            None => Err(HomesError::HomeNotFound {
                name: name.to_string(),
            }),
            Some(_)
                if visitor != owner
                    && !self.registry.is_public(owner, name)
                    && !self.world.is_admin(visitor) =>
            {
                Err(HomesError::PrivateHome {
                    name: name.to_string(),
                })
            }
            Some(home) => {
                self.executor
                    .begin(visitor, TeleportTarget::Location(home), &mut self.last, now)
            }
        };
        self.report(visitor, result)
    }

    /// Every home the player owns, sorted by name.
    pub fn list_homes(&self, player: PlayerId) -> Vec<Home> {
        let mut homes: Vec<Home> = self
            .registry
            .get_homes(player)
            .into_iter()
            .map(|(name, location)| Home {
                owner: player,
                is_public: self.registry.is_public(player, &name),
                name,
                location,
            })
            .collect();
        homes.sort_by(|a, b| a.name.cmp(&b.name));
        homes
    }

    pub fn public_homes(&self, owner: PlayerId) -> Vec<Home> {
        self.registry.public_homes(owner)
    }

    pub async fn players_with_public_homes(&self) -> Result<Vec<PlayerId>, HomesError> {
        self.registry.players_with_public_homes().await
    }

    fn resolve_online(&self, name: &str) -> Result<PlayerId, HomesError> {
        self.world
            .find_online(name)
            .ok_or_else(|| HomesError::PlayerNotFound {
                name: name.to_string(),
            })
    }

    fn ensure_tpa(&self) -> Result<(), HomesError> {
        if self.config.tpa.enabled {
            Ok(())
        } else {
            Err(HomesError::FeatureDisabled(Feature::Tpa))
        }
    }

    /// Ask `receiver_name` to let `sender` come to them (or, for
    /// [`RequestDirection::BringHere`], to come to `sender`).
    pub fn send_request(
        &mut self,
        sender: PlayerId,
        receiver_name: &str,
        direction: RequestDirection,
    ) -> Result<(), HomesError> {
        let now = self.clock.now();
        let result = self
            .ensure_tpa()
            .and_then(|_| self.resolve_online(receiver_name))
            .and_then(|receiver| self.ledger.send_request(sender, receiver, direction, now));
        self.report(sender, result)
    }

    /// Accept the newest pending request. Returns the sender.
    pub fn accept_request(&mut self, receiver: PlayerId) -> Result<PlayerId, HomesError> {
        let now = self.clock.now();
        let result = self
            .ledger
            .accept_request(receiver, &mut self.executor, &mut self.last, now);
        self.report(receiver, result)
    }

    pub fn accept_request_from(
        &mut self,
        receiver: PlayerId,
        sender_name: &str,
    ) -> Result<PlayerId, HomesError> {
        let now = self.clock.now();
        let result = self
            .ensure_tpa()
            .and_then(|_| self.resolve_online(sender_name))
            .and_then(|sender| {
                self.ledger
                    .accept_request_from(receiver, sender, &mut self.executor, &mut self.last, now)
            });
        self.report(receiver, result)
    }

    pub fn deny_request(&mut self, receiver: PlayerId) -> Result<PlayerId, HomesError> {
        let result = self.ledger.deny_request(receiver);
        self.report(receiver, result)
    }

    pub fn deny_request_from(
        &mut self,
        receiver: PlayerId,
        sender_name: &str,
    ) -> Result<PlayerId, HomesError> {
        let result = self
            .ensure_tpa()
            .and_then(|_| self.resolve_online(sender_name))
            .and_then(|sender| self.ledger.deny_request_from(receiver, sender));
        self.report(receiver, result)
    }

    pub fn cancel_request(&mut self, sender: PlayerId, receiver_name: &str) -> Result<(), HomesError> {
        let result = self.ledger.cancel_request(sender, receiver_name);
        self.report(sender, result)
    }

    /// Returns true when the player now accepts requests.
    pub fn toggle_requests(&mut self, player: PlayerId) -> Result<bool, HomesError> {
        let result = self.ledger.toggle_opt_out(player);
        self.report(player, result)
    }

    /// Returns true when `other_name` is now ignored.
    pub fn toggle_ignore(&mut self, player: PlayerId, other_name: &str) -> Result<bool, HomesError> {
        let result = self
            .ensure_tpa()
            .and_then(|_| self.resolve_online(other_name))
            .and_then(|other| self.ledger.toggle_ignored(player, other));
        self.report(player, result)
    }

    /// Start a delayed teleport back to the last recorded location.
    pub fn return_to_last_location(&mut self, player: PlayerId) -> Result<(), HomesError> {
        let now = self.clock.now();
        let result = self.last.swap_and_return(player, &mut self.executor, now);
        if result.is_ok() {
            self.tell(player, MessageKey::BackSuccess, MessageParams::new());
        }
        self.report(player, result)
    }

    /// Stop the player's countdown. Returns false if none was running.
    pub fn cancel_teleport(&mut self, player: PlayerId) -> bool {
        self.executor.cancel(player).is_some()
    }

    /// Drop the whole home cache and reload everyone online.
    pub fn reload(&self) {
        self.registry.reload(&self.world.online_players());
    }

    /// Wait for every scheduled durable write to finish.
    pub async fn shutdown(&self) {
        info!(
            "flushing {} pending home storage tasks",
            self.registry.pending_tasks()
        );
        self.registry.flush().await;
        info!("home storage flushed");
    }
}
