//! Registry wiring from [`Settings`]

use std::sync::Arc;

use recache_core::{CacheError, CacheResult, KeyedCacheRegistry, Persister};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Settings;
use crate::persist::FilePersister;

/// Build a registry from settings.
///
/// With `persistence.directory` set, slots persist through a
/// [`FilePersister`] rooted there; otherwise the registry is memory-only.
/// Log lines go through `tracing`.
///
/// # Errors
/// - [`CacheError::Config`] for invalid cache settings
/// - [`CacheError::Persistence`] if the persistence directory cannot be
///   created
pub async fn build_registry<T>(settings: &Settings) -> CacheResult<KeyedCacheRegistry<T>>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let config = settings.cache_config()?;
    let mut builder = KeyedCacheRegistry::builder(config);

    if let Some(directory) = &settings.persistence.directory {
        let persister = FilePersister::<T>::open(directory)
            .await
            .map_err(|err| CacheError::persistence(directory.display().to_string(), err))?;
        tracing::info!(directory = %directory.display(), "file persistence enabled");
        builder = builder.persister(Arc::new(persister) as Arc<dyn Persister<T>>);
    }

    builder.build()
}
