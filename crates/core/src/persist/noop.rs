use std::marker::PhantomData;

use async_trait::async_trait;
use recache_common::CommonResult;

use super::Persister;

/// Persister that stores nothing. Reads always come back empty.
#[derive(Debug)]
pub struct NoopPersister<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> NoopPersister<T> {
    pub const fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for NoopPersister<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for NoopPersister<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Persister<T> for NoopPersister<T>
where
    T: Send + Sync + 'static,
{
    async fn read(&self, _key: &str) -> CommonResult<Vec<T>> {
        Ok(Vec::new())
    }

    async fn write(&self, _key: &str, _value: &T) -> CommonResult<()> {
        Ok(())
    }

    async fn write_all(&self, _key: &str, _values: &[T]) -> CommonResult<()> {
        Ok(())
    }

    async fn invalidate(&self, _key: &str) -> CommonResult<()> {
        Ok(())
    }

    async fn clear_all(&self) -> CommonResult<()> {
        Ok(())
    }
}
