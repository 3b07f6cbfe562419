//! Shared fixtures for integration tests: an in-memory world, a notifier that
//! records everything, and a store wrapper with slow (or failing) writes.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hearth::clock::ManualClock;
use hearth::config::Config;
use hearth::homes::{Location, PlayerId};
use hearth::messages::{MessageKey, MessageParams};
use hearth::service::HomesService;
use hearth::storage::{HomeStore, SledHomeStore, SledHomeStoreBuilder, StoreError};
use hearth::world::{Notifier, World};
use tempfile::TempDir;

pub fn loc(x: f64, y: f64, z: f64) -> Location {
    Location::new("overworld", x, y, z)
}

#[derive(Default)]
struct Player {
    name: String,
    at: Option<Location>,
    admin: bool,
    limit: Option<u32>,
}

/// Players live here while "online".
#[derive(Default)]
pub struct FakeWorld {
    players: Mutex<HashMap<PlayerId, Player>>,
    refuse: AtomicBool,
}

impl FakeWorld {
    pub fn join(&self, name: &str, at: Location) -> PlayerId {
        let id = PlayerId::new_v4();
        self.rejoin(id, name, at);
        id
    }

    pub fn rejoin(&self, id: PlayerId, name: &str, at: Location) {
        self.players.lock().unwrap().insert(
            id,
            Player {
                name: name.to_string(),
                at: Some(at),
                ..Player::default()
            },
        );
    }

    pub fn leave(&self, id: PlayerId) {
        self.players.lock().unwrap().remove(&id);
    }

    pub fn walk(&self, id: PlayerId, to: Location) {
        if let Some(p) = self.players.lock().unwrap().get_mut(&id) {
            p.at = Some(to);
        }
    }

    pub fn make_admin(&self, id: PlayerId) {
        if let Some(p) = self.players.lock().unwrap().get_mut(&id) {
            p.admin = true;
        }
    }

    pub fn grant_limit(&self, id: PlayerId, limit: u32) {
        if let Some(p) = self.players.lock().unwrap().get_mut(&id) {
            p.limit = Some(limit);
        }
    }

    pub fn refuse_relocation(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn at(&self, id: PlayerId) -> Option<Location> {
        self.position(id)
    }
}

impl World for FakeWorld {
    fn is_online(&self, player: PlayerId) -> bool {
        self.players.lock().unwrap().contains_key(&player)
    }

    fn position(&self, player: PlayerId) -> Option<Location> {
        self.players.lock().unwrap().get(&player).and_then(|p| p.at.clone())
    }

    fn display_name(&self, player: PlayerId) -> Option<String> {
        self.players.lock().unwrap().get(&player).map(|p| p.name.clone())
    }

    fn find_online(&self, name: &str) -> Option<PlayerId> {
        self.players
            .lock()
            .unwrap()
            .iter()
            .find(|(_, p)| p.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }

    fn online_players(&self) -> Vec<PlayerId> {
        self.players.lock().unwrap().keys().copied().collect()
    }

    fn relocate(&self, player: PlayerId, to: &Location) -> bool {
        if self.refuse.load(Ordering::SeqCst) {
            return false;
        }
        self.walk(player, to.clone());
        true
    }

    fn is_admin(&self, player: PlayerId) -> bool {
        self.players
            .lock()
            .unwrap()
            .get(&player)
            .map(|p| p.admin)
            .unwrap_or(false)
    }

    fn home_limit(&self, player: PlayerId) -> Option<u32> {
        self.players.lock().unwrap().get(&player).and_then(|p| p.limit)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(PlayerId, MessageKey, MessageParams)>>,
}

impl RecordingNotifier {
    pub fn keys(&self, player: PlayerId) -> Vec<MessageKey> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _, _)| *p == player)
            .map(|(_, k, _)| *k)
            .collect()
    }

    pub fn count(&self, player: PlayerId, key: MessageKey) -> usize {
        self.keys(player).iter().filter(|k| **k == key).count()
    }

    pub fn last(&self, player: PlayerId) -> Option<(MessageKey, MessageParams)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _, _)| *p == player)
            .map(|(_, k, params)| (*k, params.clone()))
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, player: PlayerId, key: MessageKey, params: &MessageParams) {
        self.sent.lock().unwrap().push((player, key, params.clone()));
    }
}

/// Sled store whose durable operations sleep first and can be told to fail.
pub struct SlowStore {
    inner: SledHomeStore,
    write_delay: Duration,
    read_delay: Duration,
    fail_writes: AtomicBool,
}

impl SlowStore {
    pub fn open(dir: &TempDir, write_delay: Duration) -> Self {
        let inner = SledHomeStoreBuilder::new(dir.path().join("homes"))
            .without_flush()
            .open()
            .expect("open sled store");
        Self {
            inner,
            write_delay,
            read_delay: Duration::ZERO,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &SledHomeStore {
        &self.inner
    }

    fn before_write(&self) -> Result<(), StoreError> {
        std::thread::sleep(self.write_delay);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("simulated write failure".into()));
        }
        Ok(())
    }

    fn before_read(&self) {
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
    }
}

impl HomeStore for SlowStore {
    fn upsert_home(
        &self,
        owner: PlayerId,
        name: &str,
        location: &Location,
        is_public: bool,
    ) -> Result<(), StoreError> {
        self.before_write()?;
        self.inner.upsert_home(owner, name, location, is_public)
    }

    fn get_home(&self, owner: PlayerId, name: &str) -> Result<Option<Location>, StoreError> {
        self.before_read();
        self.inner.get_home(owner, name)
    }

    fn get_homes(&self, owner: PlayerId) -> Result<HashMap<String, Location>, StoreError> {
        self.before_read();
        self.inner.get_homes(owner)
    }

    fn get_visibility(&self, owner: PlayerId) -> Result<HashMap<String, bool>, StoreError> {
        self.before_read();
        self.inner.get_visibility(owner)
    }

    fn delete_home(&self, owner: PlayerId, name: &str) -> Result<bool, StoreError> {
        self.before_write()?;
        self.inner.delete_home(owner, name)
    }

    fn set_visibility(
        &self,
        owner: PlayerId,
        name: &str,
        is_public: bool,
    ) -> Result<bool, StoreError> {
        self.before_write()?;
        self.inner.set_visibility(owner, name, is_public)
    }

    fn list_players_with_public_homes(&self) -> Result<Vec<PlayerId>, StoreError> {
        self.before_read();
        self.inner.list_players_with_public_homes()
    }
}

/// A service wired to fakes, a manual clock and a throwaway store.
pub struct Harness {
    pub service: HomesService,
    pub world: Arc<FakeWorld>,
    pub notes: Arc<RecordingNotifier>,
    pub clock: ManualClock,
    pub store: Arc<SlowStore>,
    _dir: TempDir,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(SlowStore::open(&dir, Duration::from_millis(5)));
        let world = Arc::new(FakeWorld::default());
        let notes = Arc::new(RecordingNotifier::default());
        let clock = ManualClock::default();
        let service = HomesService::new(
            config,
            store.clone(),
            world.clone(),
            notes.clone(),
            Arc::new(clock.clone()),
            tokio::runtime::Handle::current(),
        );
        Self {
            service,
            world,
            notes,
            clock,
            store,
            _dir: dir,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Join, fire the presence event and wait for the cache to fill.
    pub async fn join(&mut self, name: &str, at: Location) -> PlayerId {
        let id = self.world.join(name, at);
        self.service
            .dispatch(hearth::service::GameEvent::PresenceStart(id));
        self.service.registry().flush().await;
        id
    }

    /// Advance the clock one second at a time, ticking after each step.
    pub fn run_for(&mut self, seconds: i64) {
        for _ in 0..seconds {
            self.clock.advance_secs(1);
            self.service.tick();
        }
    }
}
