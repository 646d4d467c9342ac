//! # Recache Infrastructure
//!
//! Infrastructure implementations of the ports defined in `recache-core`.
//!
//! This crate contains:
//! - [`persist::FilePersister`]: a JSON-file durable tier
//! - [`observability::init_tracing`]: `tracing-subscriber` setup
//! - [`config`]: settings loading from env vars or TOML/JSON files
//! - [`bootstrap::build_registry`]: wiring a registry from settings
//!
//! ## Architecture
//! - Implements traits defined in `recache-core`
//! - Contains all "impure" code (file I/O, global subscriber)

pub mod bootstrap;
pub mod config;
pub mod observability;
pub mod persist;

// Re-export commonly used items
pub use bootstrap::build_registry;
pub use config::{load, CacheSettings, LogFormat, LogSettings, PersistenceSettings, Settings};
pub use observability::init_tracing;
pub use persist::FilePersister;
