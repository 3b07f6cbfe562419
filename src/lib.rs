//! # Hearth - Player Homes and Consensual Teleports
//!
//! Hearth is the consistency core behind player homes in a shared game world.
//! Players save named locations, ask each other for teleports, and return to
//! where they were before the last jump.
//!
//! ## Features
//!
//! - **Write-through Home Cache**: Per-player cache loaded on join and dropped on leave; durable writes run on the tokio blocking pool.
//! - **Teleport Requests**: Directional requests with cooldowns, ignore lists, opt-out and expiry.
//! - **Delayed Teleports**: Cancellable countdowns that follow a moving target player.
//! - **Return**: The pre-teleport position is recorded so "return" swaps back and forth.
//! - **Sled Persistence**: One bincode record per (owner, home name).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hearth::clock::SystemClock;
//! use hearth::config::Config;
//! use hearth::service::HomesService;
//! use hearth::storage::SledHomeStore;
//! # use hearth::world::{World, Notifier};
//! # fn host() -> (Arc<dyn World>, Arc<dyn Notifier>) { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = Arc::new(SledHomeStore::open(&config.storage.data_dir)?);
//!     let (world, notifier) = host();
//!     let mut homes = HomesService::new(
//!         config,
//!         store,
//!         world,
//!         notifier,
//!         Arc::new(SystemClock),
//!         tokio::runtime::Handle::current(),
//!     );
//!     homes.tick();
//!     homes.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - Composition root and host event dispatch
//! - [`homes`] - Home data model and the write-through registry
//! - [`tpa`] - Teleport request ledger
//! - [`teleport`] - Delayed teleport executor and last-location store
//! - [`storage`] - Persistence contract and its sled implementation
//! - [`world`] - Interfaces consumed from the host
//! - [`config`] - Configuration management and validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  HomesService   │ ← Events, ticks and player operations
//! └─────────────────┘
//!     │         │
//! ┌────────┐ ┌──────────────┐
//! │ Ledger │→│   Executor   │ → LastLocationStore
//! └────────┘ └──────────────┘
//!     │
//! ┌─────────────────┐
//! │  HomeRegistry   │ ← Cache, durable writes off-thread
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   HomeStore     │ ← sled
//! └─────────────────┘
//! ```

pub mod clock;
pub mod config;
pub mod errors;
pub mod homes;
pub mod logutil;
pub mod messages;
pub mod service;
pub mod storage;
pub mod teleport;
pub mod tpa;
pub mod world;

#[cfg(test)]
mod test_support;

pub use errors::{ErrorKind, HomesError};
pub use service::{GameEvent, HomesService};
