//! # Home Persistence Layer
//!
//! Durable storage for named player locations. The rest of the crate only talks
//! to the [`HomeStore`] trait; [`SledHomeStore`] is the bundled implementation.
//!
//! ## Record layout
//!
//! One record per `(owner, home name)` in the `homes` tree, keyed as
//! `homes:<owner-uuid>:<name>`. Because the owner segment has a fixed width the
//! home name may contain any character, including `:`. Re-inserting the same key
//! replaces the record, which gives the uniqueness constraint on
//! `(owner, name)` for free.
//!
//! All operations are synchronous and may block on disk; callers running on the
//! simulation thread must hand them to the blocking pool (see
//! [`crate::homes::HomeRegistry`]).

pub mod errors;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sled::IVec;

use crate::homes::{Location, PlayerId};
use crate::logutil::escape_log;
pub use errors::StoreError;

const TREE_HOMES: &str = "homes";
const KEY_PREFIX: &str = "homes:";
pub const HOME_SCHEMA_VERSION: u8 = 1;

/// Persistence collaborator consumed by the home registry.
pub trait HomeStore: Send + Sync {
    /// Insert or replace the home `(owner, name)`.
    fn upsert_home(
        &self,
        owner: PlayerId,
        name: &str,
        location: &Location,
        is_public: bool,
    ) -> Result<(), StoreError>;

    fn get_home(&self, owner: PlayerId, name: &str) -> Result<Option<Location>, StoreError>;

    fn get_homes(&self, owner: PlayerId) -> Result<HashMap<String, Location>, StoreError>;

    /// Visibility flag of every home the owner has.
    fn get_visibility(&self, owner: PlayerId) -> Result<HashMap<String, bool>, StoreError>;

    /// Returns `Ok(false)` for unknown homes.
    fn is_public(&self, owner: PlayerId, name: &str) -> Result<bool, StoreError> {
        Ok(self
            .get_visibility(owner)?
            .get(name)
            .copied()
            .unwrap_or(false))
    }

    /// Returns whether a record was removed.
    fn delete_home(&self, owner: PlayerId, name: &str) -> Result<bool, StoreError>;

    /// Returns whether a record existed to update.
    fn set_visibility(&self, owner: PlayerId, name: &str, is_public: bool)
        -> Result<bool, StoreError>;

    fn list_players_with_public_homes(&self) -> Result<Vec<PlayerId>, StoreError>;
}

/// On-disk shape of one home.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeRecord {
    pub schema_version: u8,
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub is_public: bool,
    pub updated_at: DateTime<Utc>,
}

impl HomeRecord {
    pub fn new(location: &Location, is_public: bool) -> Self {
        Self {
            schema_version: HOME_SCHEMA_VERSION,
            world: location.world.clone(),
            x: location.x,
            y: location.y,
            z: location.z,
            yaw: location.yaw,
            pitch: location.pitch,
            is_public,
            updated_at: Utc::now(),
        }
    }

    pub fn location(&self) -> Location {
        Location {
            world: self.world.clone(),
            x: self.x,
            y: self.y,
            z: self.z,
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct SledHomeStoreBuilder {
    path: PathBuf,
    flush_on_write: bool,
}

impl SledHomeStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flush_on_write: true,
        }
    }

    /// Skip the explicit flush after every write (sled still flushes periodically).
    pub fn without_flush(mut self) -> Self {
        self.flush_on_write = false;
        self
    }

    pub fn open(self) -> Result<SledHomeStore, StoreError> {
        SledHomeStore::open_with_options(self.path, self.flush_on_write)
    }
}

/// Sled-backed [`HomeStore`].
pub struct SledHomeStore {
    _db: sled::Db,
    homes: sled::Tree,
    flush_on_write: bool,
}

impl SledHomeStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_options(path, true)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, flush_on_write: bool) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let homes = db.open_tree(TREE_HOMES)?;
        debug!("opened home store at {}", path_ref.display());
        Ok(Self {
            _db: db,
            homes,
            flush_on_write,
        })
    }

    fn home_key(owner: PlayerId, name: &str) -> Vec<u8> {
        format!("{}{}:{}", KEY_PREFIX, owner.hyphenated(), name).into_bytes()
    }

    fn owner_prefix(owner: PlayerId) -> Vec<u8> {
        format!("{}{}:", KEY_PREFIX, owner.hyphenated()).into_bytes()
    }

    /// Split `homes:<owner>:<name>` into its parts.
    fn parse_key(key: &[u8]) -> Result<(PlayerId, String), StoreError> {
        let text = std::str::from_utf8(key)
            .map_err(|_| StoreError::CorruptKey(String::from_utf8_lossy(key).into_owned()))?;
        let rest = text
            .strip_prefix(KEY_PREFIX)
            .ok_or_else(|| StoreError::CorruptKey(text.to_string()))?;
        let (owner, name) = rest
            .split_once(':')
            .ok_or_else(|| StoreError::CorruptKey(text.to_string()))?;
        Ok((PlayerId::parse_str(owner)?, name.to_string()))
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize(bytes: IVec) -> Result<HomeRecord, StoreError> {
        let record: HomeRecord = bincode::deserialize(&bytes)?;
        if record.schema_version != HOME_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "home",
                expected: HOME_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    fn flush(&self) -> Result<(), StoreError> {
        if self.flush_on_write {
            self.homes.flush()?;
        }
        Ok(())
    }

    fn get_record(&self, owner: PlayerId, name: &str) -> Result<Option<HomeRecord>, StoreError> {
        match self.homes.get(Self::home_key(owner, name))? {
            Some(bytes) => Ok(Some(Self::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_owner(&self, owner: PlayerId) -> impl Iterator<Item = Result<(String, HomeRecord), StoreError>> + '_ {
        self.homes.scan_prefix(Self::owner_prefix(owner)).map(|entry| {
            let (key, value) = entry?;
            let (_, name) = Self::parse_key(&key)?;
            Ok((name, Self::deserialize(value)?))
        })
    }

    /// Total number of home records.
    pub fn count_homes(&self) -> usize {
        self.homes.len()
    }

    /// Every owner with at least one home, in id order.
    pub fn list_owners(&self) -> Result<Vec<PlayerId>, StoreError> {
        let mut owners = BTreeSet::new();
        for entry in self.homes.scan_prefix(KEY_PREFIX.as_bytes()) {
            let (key, _) = entry?;
            owners.insert(Self::parse_key(&key)?.0);
        }
        Ok(owners.into_iter().collect())
    }
}

impl HomeStore for SledHomeStore {
    fn upsert_home(
        &self,
        owner: PlayerId,
        name: &str,
        location: &Location,
        is_public: bool,
    ) -> Result<(), StoreError> {
        let bytes = Self::serialize(&HomeRecord::new(location, is_public))?;
        self.homes.insert(Self::home_key(owner, name), bytes)?;
        self.flush()?;
        debug!("stored home {}:{}", owner, escape_log(name));
        Ok(())
    }

    fn get_home(&self, owner: PlayerId, name: &str) -> Result<Option<Location>, StoreError> {
        Ok(self.get_record(owner, name)?.map(|r| r.location()))
    }

    fn get_homes(&self, owner: PlayerId) -> Result<HashMap<String, Location>, StoreError> {
        self.scan_owner(owner)
            .map(|entry| entry.map(|(name, record)| (name, record.location())))
            .collect()
    }

    fn get_visibility(&self, owner: PlayerId) -> Result<HashMap<String, bool>, StoreError> {
        self.scan_owner(owner)
            .map(|entry| entry.map(|(name, record)| (name, record.is_public)))
            .collect()
    }

    fn is_public(&self, owner: PlayerId, name: &str) -> Result<bool, StoreError> {
        Ok(self
            .get_record(owner, name)?
            .map(|r| r.is_public)
            .unwrap_or(false))
    }

    fn delete_home(&self, owner: PlayerId, name: &str) -> Result<bool, StoreError> {
        let removed = self.homes.remove(Self::home_key(owner, name))?.is_some();
        self.flush()?;
        Ok(removed)
    }

    fn set_visibility(
        &self,
        owner: PlayerId,
        name: &str,
        is_public: bool,
    ) -> Result<bool, StoreError> {
        let Some(mut record) = self.get_record(owner, name)? else {
            return Ok(false);
        };
        record.is_public = is_public;
        record.updated_at = Utc::now();
        self.homes
            .insert(Self::home_key(owner, name), Self::serialize(&record)?)?;
        self.flush()?;
        Ok(true)
    }

    fn list_players_with_public_homes(&self) -> Result<Vec<PlayerId>, StoreError> {
        let mut owners = BTreeSet::new();
        for entry in self.homes.scan_prefix(KEY_PREFIX.as_bytes()) {
            let (key, value) = entry?;
            if Self::deserialize(value)?.is_public {
                owners.insert(Self::parse_key(&key)?.0);
            }
        }
        Ok(owners.into_iter().collect())
    }
}
