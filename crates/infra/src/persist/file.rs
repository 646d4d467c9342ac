use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use recache_common::{CommonError, CommonResult};
use recache_core::Persister;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Persistence format version
pub const PERSISTENCE_VERSION: u32 = 1;

const HISTORY_EXTENSION: &str = "json";

/// On-disk layout of one key's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedHistory<T> {
    pub version: u32,
    pub key: String,
    pub values: Vec<T>,
}

/// Persister storing each key's history as a JSON file under a directory.
///
/// File names are the BLAKE3 hex digest of the key, so arbitrary keys map
/// to safe, fixed-length names. Writes go to a temporary file that is then
/// renamed over the target, so readers never observe a partial history.
/// Mutations are serialized per persister.
pub struct FilePersister<T> {
    root: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FilePersister<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Open (and create if needed) the directory holding the histories.
    ///
    /// # Errors
    /// Returns `CommonError::Persistence` if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> CommonResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            CommonError::persistence_op("open", format!("{}: {e}", root.display()))
        })?;
        debug!(root = %root.display(), "opened file persister");

        Ok(Self { root, write_lock: Mutex::new(()), _marker: PhantomData })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds the history of `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = blake3::hash(key.as_bytes());
        self.root.join(format!("{}.{HISTORY_EXTENSION}", hex::encode(digest.as_bytes())))
    }

    async fn load(&self, key: &str) -> CommonResult<Vec<T>> {
        let path = self.path_for(key);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CommonError::persistence_op("read", e.to_string())),
        };

        let history: PersistedHistory<T> = serde_json::from_slice(&data)?;

        if history.version != PERSISTENCE_VERSION {
            warn!(
                expected = PERSISTENCE_VERSION,
                found = history.version,
                "persistence version mismatch"
            );
        }
        if history.key != key {
            warn!(path = %path.display(), "history file belongs to another key, ignoring it");
            return Ok(Vec::new());
        }

        Ok(history.values)
    }

    async fn store(&self, key: &str, values: Vec<T>) -> CommonResult<()> {
        let path = self.path_for(key);
        let history = PersistedHistory { version: PERSISTENCE_VERSION, key: key.to_string(), values };
        let data = serde_json::to_vec(&history)?;

        // Write to temporary file first for atomicity
        let temp_path = self.root.join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(err) = Self::replace_file(&temp_path, &path, &data).await {
            fs::remove_file(&temp_path).await.ok();
            return Err(err);
        }

        debug!(key, values = history.values.len(), bytes = data.len(), "persisted history");
        Ok(())
    }

    /// Write `data` to `temp_path`, flush it and rename it over `target`.
    async fn replace_file(temp_path: &Path, target: &Path, data: &[u8]) -> CommonResult<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp_path)
            .await
            .map_err(|e| CommonError::persistence_op("write", e.to_string()))?;
        file.write_all(data).await.map_err(|e| CommonError::persistence_op("write", e.to_string()))?;
        file.sync_all().await.map_err(|e| CommonError::persistence_op("sync", e.to_string()))?;
        drop(file);

        fs::rename(temp_path, target)
            .await
            .map_err(|e| CommonError::persistence_op("rename", e.to_string()))
    }

    async fn append(&self, key: &str, values: &[T]) -> CommonResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut history = self.load(key).await?;
        history.extend_from_slice(values);
        self.store(key, history).await
    }
}

#[async_trait]
impl<T> Persister<T> for FilePersister<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    #[instrument(skip(self))]
    async fn read(&self, key: &str) -> CommonResult<Vec<T>> {
        self.load(key).await
    }

    async fn write(&self, key: &str, value: &T) -> CommonResult<()> {
        self.append(key, std::slice::from_ref(value)).await
    }

    #[instrument(skip(self, values), fields(count = values.len()))]
    async fn write_all(&self, key: &str, values: &[T]) -> CommonResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.append(key, values).await
    }

    async fn invalidate(&self, key: &str) -> CommonResult<()> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!(key, "invalidated persisted history");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CommonError::persistence_op("invalidate", e.to_string())),
        }
    }

    async fn clear_all(&self) -> CommonResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| CommonError::persistence_op("clear_all", e.to_string()))?;

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(HISTORY_EXTENSION) {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }

        debug!(removed, "cleared persisted histories");
        Ok(())
    }
}

impl<T> std::fmt::Debug for FilePersister<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePersister").field("root", &self.root).finish_non_exhaustive()
    }
}
