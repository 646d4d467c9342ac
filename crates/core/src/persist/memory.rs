use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use recache_common::CommonResult;

use super::Persister;

/// Process-local persister backed by a map of histories.
///
/// Useful in tests and for hosts that only need the durable-tier semantics
/// (read-through, append, invalidate) without touching disk.
#[derive(Debug)]
pub struct InMemoryPersister<T> {
    histories: RwLock<HashMap<String, Vec<T>>>,
}

impl<T> InMemoryPersister<T> {
    pub fn new() -> Self {
        Self { histories: RwLock::new(HashMap::new()) }
    }

    /// Keys with a stored history.
    pub fn keys(&self) -> Vec<String> {
        self.histories.read().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.read().is_empty()
    }
}

impl<T: Clone> InMemoryPersister<T> {
    /// Seed the history of `key` without going through the async port.
    pub fn with_history(self, key: impl Into<String>, values: Vec<T>) -> Self {
        self.histories.write().insert(key.into(), values);
        self
    }

    /// Copy of what is stored for `key`.
    pub fn stored(&self, key: &str) -> Vec<T> {
        self.histories.read().get(key).cloned().unwrap_or_default()
    }
}

impl<T> Default for InMemoryPersister<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Persister<T> for InMemoryPersister<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn read(&self, key: &str) -> CommonResult<Vec<T>> {
        Ok(self.stored(key))
    }

    async fn write(&self, key: &str, value: &T) -> CommonResult<()> {
        self.histories.write().entry(key.to_string()).or_default().push(value.clone());
        Ok(())
    }

    async fn write_all(&self, key: &str, values: &[T]) -> CommonResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.histories.write().entry(key.to_string()).or_default().extend_from_slice(values);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> CommonResult<()> {
        self.histories.write().remove(key);
        Ok(())
    }

    async fn clear_all(&self) -> CommonResult<()> {
        self.histories.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the in-memory persister.
    use super::*;

    /// Validates append semantics across `write` and `write_all`.
    ///
    /// Assertions:
    /// - Values come back in write order.
    /// - Other keys are unaffected.
    #[tokio::test]
    async fn test_writes_append_in_order() {
        let persister = InMemoryPersister::new();

        persister.write("a", &1).await.unwrap();
        persister.write_all("a", &[2, 3]).await.unwrap();
        persister.write("b", &9).await.unwrap();

        assert_eq!(persister.read("a").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(persister.read("b").await.unwrap(), vec![9]);
        assert!(persister.read("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_write_all_creates_nothing() {
        let persister = InMemoryPersister::<u8>::new();
        persister.write_all("a", &[]).await.unwrap();
        assert!(persister.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear_all() {
        let persister = InMemoryPersister::new().with_history("a", vec![1]).with_history("b", vec![2]);

        persister.invalidate("a").await.unwrap();
        assert_eq!(persister.keys(), vec!["b".to_string()]);

        persister.clear_all().await.unwrap();
        assert!(persister.is_empty());
    }
}
