//! Durable tier implementations

mod file;

pub use file::{FilePersister, PersistedHistory, PERSISTENCE_VERSION};
