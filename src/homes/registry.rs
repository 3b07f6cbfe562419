//! Write-through cache of player homes.
//!
//! Reads are served from memory for every player whose presence has started;
//! writes update memory synchronously and reach the [`HomeStore`] on the
//! blocking pool. A player without a cache entry (not yet loaded, or already
//! gone) falls back to a direct, blocking read from the store.
//!
//! Writes made while a player's load is still fetching are kept in an overlay
//! and replayed over the fetched maps when the load installs, so a load never
//! hides a write that was issued after it started.
//!
//! The cache is the only state shared between the simulation thread and the
//! background I/O tasks, so it sits behind an `RwLock`. Values handed to a
//! background task are owned clones and are never touched again by the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::errors::HomesError;
use crate::homes::{Home, Location, PlayerId};
use crate::logutil::escape_log;
use crate::storage::{HomeStore, StoreError};

/// Cached homes of one player. `public` always has a key for every name in
/// `homes` and no other keys.
#[derive(Debug, Clone, Default)]
struct CacheEntry {
    homes: HashMap<String, Location>,
    public: HashMap<String, bool>,
}

impl CacheEntry {
    fn from_store(homes: HashMap<String, Location>, mut visibility: HashMap<String, bool>) -> Self {
        let public = homes
            .keys()
            .map(|name| (name.clone(), visibility.remove(name).unwrap_or(false)))
            .collect();
        Self { homes, public }
    }

    fn apply(&mut self, name: &str, write: &PendingWrite) {
        match write {
            PendingWrite::Upsert {
                location,
                is_public,
            } => {
                self.homes.insert(name.to_string(), location.clone());
                self.public.insert(name.to_string(), *is_public);
            }
            PendingWrite::Visibility(is_public) => {
                if self.homes.contains_key(name) {
                    self.public.insert(name.to_string(), *is_public);
                }
            }
            PendingWrite::Delete => {
                self.homes.remove(name);
                self.public.remove(name);
            }
        }
    }
}

/// A write made while a load for the same player is running.
#[derive(Debug, Clone)]
enum PendingWrite {
    Upsert { location: Location, is_public: bool },
    Visibility(bool),
    Delete,
}

/// Exists only while at least one load for the player is running.
#[derive(Debug, Default)]
struct LoadState {
    /// Bumped on unload/reload; loads started under an older value install nothing.
    generation: u64,
    running: usize,
    /// Writes since the load started, replayed over whatever it fetched.
    overlay: HashMap<String, PendingWrite>,
}

impl LoadState {
    fn record(&mut self, name: &str, write: PendingWrite) {
        let merged = match (self.overlay.remove(name), write) {
            (Some(PendingWrite::Upsert { location, .. }), PendingWrite::Visibility(is_public)) => {
                PendingWrite::Upsert {
                    location,
                    is_public,
                }
            }
            (Some(PendingWrite::Delete), PendingWrite::Visibility(_)) => PendingWrite::Delete,
            (_, write) => write,
        };
        self.overlay.insert(name.to_string(), merged);
    }

    fn discard(&mut self) {
        self.generation += 1;
        self.overlay.clear();
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<PlayerId, CacheEntry>,
    loads: HashMap<PlayerId, LoadState>,
}

impl CacheState {
    /// Apply a write to the cached entry and remember it for any running load.
    fn write(&mut self, player: PlayerId, name: &str, write: PendingWrite) {
        if let Some(entry) = self.entries.get_mut(&player) {
            entry.apply(name, &write);
        }
        if let Some(load) = self.loads.get_mut(&player) {
            load.record(name, write);
        }
    }

    fn pending(&self, player: PlayerId, name: &str) -> Option<&PendingWrite> {
        self.loads.get(&player)?.overlay.get(name)
    }

    fn overlay(&self, player: PlayerId) -> Vec<(String, PendingWrite)> {
        self.loads
            .get(&player)
            .map(|load| {
                load.overlay
                    .iter()
                    .map(|(name, write)| (name.clone(), write.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Visibility the cache or a running load knows for a home.
    fn known_visibility(&self, player: PlayerId, name: &str) -> Option<bool> {
        if let Some(entry) = self.entries.get(&player) {
            return entry.public.get(name).copied();
        }
        match self.pending(player, name)? {
            PendingWrite::Upsert { is_public, .. } | PendingWrite::Visibility(is_public) => {
                Some(*is_public)
            }
            PendingWrite::Delete => None,
        }
    }

    /// Bookkeeping when a load task ends. Returns the overlay to replay, or
    /// `None` when the load was discarded.
    fn finish_load(&mut self, player: PlayerId, generation: u64) -> Option<Vec<(String, PendingWrite)>> {
        let (current, finished) = match self.loads.get_mut(&player) {
            Some(load) => {
                load.running = load.running.saturating_sub(1);
                (load.generation == generation, load.running == 0)
            }
            None => (false, true),
        };
        let overlay = current.then(|| self.overlay(player));
        if finished {
            self.loads.remove(&player);
        }
        overlay
    }
}

/// Per-player home cache backed by a [`HomeStore`].
pub struct HomeRegistry {
    store: Arc<dyn HomeStore>,
    cache: Arc<RwLock<CacheState>>,
    runtime: Handle,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl HomeRegistry {
    /// `runtime` provides the blocking pool used for durable I/O.
    pub fn new(store: Arc<dyn HomeStore>, runtime: Handle) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(CacheState::default())),
            runtime,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Run a durable operation on the blocking pool. Failures are logged only.
    fn spawn_durable<F>(&self, what: String, op: F)
    where
        F: FnOnce(&dyn HomeStore) -> Result<(), StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let handle = self.runtime.spawn_blocking(move || {
            if let Err(e) = op(store.as_ref()) {
                warn!("durable {} failed: {}", what, e);
            }
        });
        self.track(handle);
    }

    /// Fetch the player's homes in the background and install them, replacing
    /// any existing entry. Writes made while the fetch runs are replayed on
    /// top. Concurrent loads for the same player: last to finish wins.
    pub fn load(&self, player: PlayerId) {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        let generation = {
            let mut state = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            let load = state.loads.entry(player).or_default();
            load.running += 1;
            load.generation
        };
        let handle = self.runtime.spawn_blocking(move || {
            let fetched = store
                .get_homes(player)
                .and_then(|homes| Ok((homes, store.get_visibility(player)?)));
            let mut state = cache.write().unwrap_or_else(PoisonError::into_inner);
            let Some(overlay) = state.finish_load(player, generation) else {
                debug!("discarding stale home load for {}", player);
                return;
            };
            match fetched {
                Ok((homes, visibility)) => {
                    let mut entry = CacheEntry::from_store(homes, visibility);
                    for (name, write) in &overlay {
                        entry.apply(name, write);
                    }
                    debug!(
                        "cached {} homes for {} ({} replayed writes)",
                        entry.homes.len(),
                        player,
                        overlay.len()
                    );
                    state.entries.insert(player, entry);
                }
                Err(e) => warn!("loading homes for {} failed: {}", player, e),
            }
        });
        self.track(handle);
    }

    /// Drop the player's cache entry. Durable storage is untouched.
    pub fn unload(&self, player: PlayerId) {
        let mut state = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(load) = state.loads.get_mut(&player) {
            load.discard();
        }
        if state.entries.remove(&player).is_some() {
            debug!("unloaded homes for {}", player);
        }
    }

    pub fn is_loaded(&self, player: PlayerId) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .contains_key(&player)
    }

    /// Upsert a home, keeping its current visibility (private when unknown).
    pub fn set_home(&self, player: PlayerId, name: &str, location: Location) {
        let is_public = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .known_visibility(player, name)
            .unwrap_or(false);
        self.set_home_with_visibility(player, name, location, is_public);
    }

    /// Upsert a home with an explicit visibility flag.
    pub fn set_home_with_visibility(
        &self,
        player: PlayerId,
        name: &str,
        location: Location,
        is_public: bool,
    ) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).write(
            player,
            name,
            PendingWrite::Upsert {
                location: location.clone(),
                is_public,
            },
        );
        let name = name.to_string();
        self.spawn_durable(format!("upsert of {}:{}", player, escape_log(&name)), move |store| {
            store.upsert_home(player, &name, &location, is_public)
        });
    }

    /// Change the visibility flag of an existing home.
    pub fn set_public(&self, player: PlayerId, name: &str, is_public: bool) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .write(player, name, PendingWrite::Visibility(is_public));
        let name = name.to_string();
        self.spawn_durable(format!("visibility update of {}:{}", player, escape_log(&name)), move |store| {
            if !store.set_visibility(player, &name, is_public)? {
                debug!("visibility update for missing home {}:{}", player, escape_log(&name));
            }
            Ok(())
        });
    }

    pub fn delete_home(&self, player: PlayerId, name: &str) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .write(player, name, PendingWrite::Delete);
        let name = name.to_string();
        self.spawn_durable(format!("delete of {}:{}", player, escape_log(&name)), move |store| {
            store.delete_home(player, &name).map(|_| ())
        });
    }

    /// Blocking store read with writes made during a running load replayed on top.
    fn read_through(&self, player: PlayerId) -> Result<CacheEntry, StoreError> {
        let overlay = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .overlay(player);
        let mut entry =
            CacheEntry::from_store(self.store.get_homes(player)?, self.store.get_visibility(player)?);
        for (name, write) in &overlay {
            entry.apply(name, write);
        }
        Ok(entry)
    }

    pub fn get_home(&self, player: PlayerId, name: &str) -> Option<Location> {
        {
            let state = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = state.entries.get(&player) {
                return entry.homes.get(name).cloned();
            }
            match state.pending(player, name) {
                Some(PendingWrite::Upsert { location, .. }) => return Some(location.clone()),
                Some(PendingWrite::Delete) => return None,
                _ => {}
            }
        }
        match self.store.get_home(player, name) {
            Ok(location) => location,
            Err(e) => {
                warn!("fallback read of {}:{} failed: {}", player, escape_log(name), e);
                None
            }
        }
    }

    /// Copy of every home the player owns.
    pub fn get_homes(&self, player: PlayerId) -> HashMap<String, Location> {
        {
            let state = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = state.entries.get(&player) {
                return entry.homes.clone();
            }
        }
        match self.read_through(player) {
            Ok(entry) => entry.homes,
            Err(e) => {
                warn!("fallback read of homes for {} failed: {}", player, e);
                HashMap::new()
            }
        }
    }

    pub fn is_public(&self, player: PlayerId, name: &str) -> bool {
        {
            let state = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = state.entries.get(&player) {
                return entry.public.get(name).copied().unwrap_or(false);
            }
        }
        match self.read_through(player) {
            Ok(entry) => entry.public.get(name).copied().unwrap_or(false),
            Err(e) => {
                warn!("fallback visibility read of {}:{} failed: {}", player, escape_log(name), e);
                false
            }
        }
    }

    pub fn has_home(&self, player: PlayerId, name: &str) -> bool {
        self.get_home(player, name).is_some()
    }

    pub fn home_count(&self, player: PlayerId) -> usize {
        self.get_homes(player).len()
    }

    /// Full [`Home`] view of one home.
    pub fn home(&self, player: PlayerId, name: &str) -> Option<Home> {
        let location = self.get_home(player, name)?;
        Some(Home {
            owner: player,
            name: name.to_string(),
            location,
            is_public: self.is_public(player, name),
        })
    }

    /// The owner's public homes, sorted by name.
    pub fn public_homes(&self, player: PlayerId) -> Vec<Home> {
        let mut homes: Vec<Home> = self
            .get_homes(player)
            .into_iter()
            .filter(|(name, _)| self.is_public(player, name))
            .map(|(name, location)| Home {
                owner: player,
                name,
                location,
                is_public: true,
            })
            .collect();
        homes.sort_by(|a, b| a.name.cmp(&b.name));
        homes
    }

    /// Owners with at least one public home, read on the blocking pool.
    pub async fn players_with_public_homes(&self) -> Result<Vec<PlayerId>, HomesError> {
        let store = Arc::clone(&self.store);
        let owners = self
            .runtime
            .spawn_blocking(move || store.list_players_with_public_homes())
            .await
            .map_err(|e| StoreError::Internal(format!("public home listing task: {}", e)))??;
        Ok(owners)
    }

    /// Clear the whole cache and reload every listed (present) player.
    pub fn reload(&self, present: &[PlayerId]) {
        {
            let mut state = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            for load in state.loads.values_mut() {
                load.discard();
            }
            state.entries.clear();
        }
        info!("home cache cleared; reloading {} players", present.len());
        for &player in present {
            self.load(player);
        }
    }

    /// Number of background tasks not yet finished.
    pub fn pending_tasks(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait for every background load and durable write scheduled so far.
    pub async fn flush(&self) {
        loop {
            let batch = std::mem::take(
                &mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    warn!("home storage task ended abnormally: {}", e);
                }
            }
        }
    }
}
