//! Per-key single-flight request coalescing
//!
//! A [`RequestCoalescer`] guarantees that at most one upstream fetch per key
//! is running. The first caller starts the producer; every caller that
//! arrives while it runs gets a [`FetchHandle`] onto the same shared future
//! and receives the same outcome. Once the fetch settles the next request
//! starts a fresh one.
//!
//! Cancellation aborts the running fetch: joined callers observe
//! [`CacheError::Cancelled`] and the producer future is dropped.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{AbortHandle, Abortable, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;

use crate::error::CacheError;
use crate::logging::Logger;

type FetchOutcome<T> = Result<T, CacheError>;
type SharedFetch<T> = Shared<BoxFuture<'static, FetchOutcome<T>>>;

struct InFlight<T> {
    generation: u64,
    fetch: SharedFetch<T>,
    abort: AbortHandle,
}

/// Counters describing how requests were served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Fetches started (producer invocations)
    pub started: u64,
    /// Requests that joined a fetch already in flight
    pub joined: u64,
    /// Fetches whose producer returned a value
    pub succeeded: u64,
    /// Fetches whose producer returned an error
    pub failed: u64,
    /// Fetches aborted by `cancel`
    pub cancelled: u64,
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    joined: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CoalescerStats {
        CoalescerStats {
            started: self.started.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Single-flight gate for one key.
pub struct RequestCoalescer<T> {
    key: String,
    in_flight: Arc<Mutex<Option<InFlight<T>>>>,
    next_generation: AtomicU64,
    counters: Arc<Counters>,
    logger: Logger,
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_logger(key, Logger::disabled())
    }

    pub fn with_logger(key: impl Into<String>, logger: Logger) -> Self {
        Self {
            key: key.into(),
            in_flight: Arc::new(Mutex::new(None)),
            next_generation: AtomicU64::new(0),
            counters: Arc::new(Counters::default()),
            logger,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Return a handle onto the in-flight fetch, starting one with `producer`
    /// if none is running.
    ///
    /// `producer` is only called when a new fetch starts, and then exactly
    /// once, on the first poll of the returned handle. The fetch only makes
    /// progress while at least one handle is polled; dropping every handle
    /// leaves it parked until the next request joins it or it is cancelled.
    pub fn request<F, Fut, E>(&self, producer: F) -> FetchHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut slot = self.in_flight.lock();

        if let Some(in_flight) = slot.as_ref() {
            Counters::bump(&self.counters.joined);
            self.logger.log("joining in-flight fetch");
            return FetchHandle { fetch: in_flight.fetch.clone() };
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (abort, registration) = AbortHandle::new_pair();
        let fetch = self.fetch_future(generation, producer, registration);

        *slot = Some(InFlight { generation, fetch: fetch.clone(), abort });
        Counters::bump(&self.counters.started);
        self.logger.log("starting upstream fetch");

        FetchHandle { fetch }
    }

    /// Abort the in-flight fetch, if any. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        let taken = self.in_flight.lock().take();
        match taken {
            Some(in_flight) => {
                in_flight.abort.abort();
                Counters::bump(&self.counters.cancelled);
                self.logger.log("cancelled in-flight fetch");
                true
            }
            None => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    pub fn stats(&self) -> CoalescerStats {
        self.counters.snapshot()
    }

    fn fetch_future<F, Fut, E>(
        &self,
        generation: u64,
        producer: F,
        registration: futures::future::AbortRegistration,
    ) -> SharedFetch<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = self.key.clone();
        // Weak so a parked fetch does not keep its own gate alive
        let cell = Arc::downgrade(&self.in_flight);
        let counters = Arc::clone(&self.counters);
        let logger = self.logger.clone();

        async move {
            let outcome = match Abortable::new(async move { producer().await }, registration).await {
                Ok(Ok(value)) => {
                    Counters::bump(&counters.succeeded);
                    Ok(value)
                }
                Ok(Err(err)) => {
                    Counters::bump(&counters.failed);
                    logger.error(&err, "upstream fetch failed");
                    Err(CacheError::fetch(key, err))
                }
                Err(_aborted) => Err(CacheError::cancelled(key)),
            };

            // A newer fetch may already own the gate after a cancel
            if let Some(cell) = cell.upgrade() {
                let mut slot = cell.lock();
                if slot.as_ref().is_some_and(|current| current.generation == generation) {
                    *slot = None;
                }
            }

            outcome
        }
        .boxed()
        .shared()
    }
}

impl<T> std::fmt::Debug for RequestCoalescer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoalescer")
            .field("key", &self.key)
            .field("in_flight", &self.in_flight.lock().is_some())
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

/// Awaitable share of an in-flight fetch.
#[must_use = "a fetch only makes progress while its handle is polled"]
pub struct FetchHandle<T> {
    fetch: SharedFetch<T>,
}

impl<T> Clone for FetchHandle<T> {
    fn clone(&self) -> Self {
        Self { fetch: self.fetch.clone() }
    }
}

impl<T: Clone> Future for FetchHandle<T> {
    type Output = FetchOutcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.fetch).poll(cx)
    }
}

impl<T> std::fmt::Debug for FetchHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for request coalescing.
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use futures::future::join_all;
    use tokio::sync::oneshot;

    use super::*;

    struct DropFlag(Arc<std::sync::atomic::AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Validates that concurrent requests share a single producer call.
    ///
    /// Assertions:
    /// - The producer runs exactly once for 10 overlapping requests.
    /// - Every caller receives the produced value.
    /// - Stats report 1 start and 9 joins.
    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let coalescer = RequestCoalescer::new("user:1");
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let calls = Arc::clone(&calls);
                coalescer.request(move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, io::Error>("fresh".to_string())
                })
            })
            .collect();

        let results = join_all(handles).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| matches!(r.as_deref(), Ok("fresh"))));
        assert_eq!(coalescer.stats().started, 1);
        assert_eq!(coalescer.stats().joined, 9);
        assert!(!coalescer.is_in_flight());
    }

    /// A settled fetch is not reused: the next request starts a new cycle.
    #[tokio::test]
    async fn test_sequential_requests_start_new_cycles() {
        let coalescer = RequestCoalescer::new("k");

        let first = coalescer.request(|| async { Ok::<_, io::Error>(1) }).await.unwrap();
        let second = coalescer.request(|| async { Ok::<_, io::Error>(2) }).await.unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(coalescer.stats().started, 2);
    }

    /// Validates that a producer failure reaches every joined caller and
    /// the gate reopens afterwards.
    #[tokio::test]
    async fn test_failure_is_shared_and_gate_reopens() {
        let coalescer = RequestCoalescer::<u32>::new("k");
        let (tx, rx) = oneshot::channel::<()>();

        let first = coalescer.request(move || async move {
            let _ = rx.await;
            Err::<u32, _>(io::Error::new(io::ErrorKind::ConnectionRefused, "upstream down"))
        });
        let second = coalescer.request(|| async { Ok::<_, io::Error>(7) });
        tx.send(()).unwrap();

        let (a, b) = futures::join!(first, second);
        for outcome in [a, b] {
            match outcome {
                Err(CacheError::Fetch { key, source }) => {
                    assert_eq!(key, "k");
                    assert_eq!(source.to_string(), "upstream down");
                }
                other => panic!("expected fetch error, got {other:?}"),
            }
        }

        assert_eq!(coalescer.request(|| async { Ok::<_, io::Error>(7) }).await.unwrap(), 7);
        assert_eq!(coalescer.stats().failed, 1);
    }

    /// Validates cancellation of a pending fetch.
    ///
    /// Assertions:
    /// - The waiting caller observes `Cancelled`.
    /// - The producer future is dropped.
    /// - A later request starts a new fetch.
    #[tokio::test]
    async fn test_cancel_aborts_pending_fetch() {
        let coalescer = Arc::new(RequestCoalescer::<u32>::new("k"));
        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&dropped));

        let handle = coalescer.request(move || async move {
            let _flag = flag;
            futures::future::pending::<()>().await;
            Ok::<u32, io::Error>(0)
        });
        let waiter = tokio::spawn(handle);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coalescer.is_in_flight());
        assert!(coalescer.cancel());

        let outcome = waiter.await.unwrap();
        assert!(matches!(outcome, Err(CacheError::Cancelled { .. })));
        assert!(dropped.load(Ordering::SeqCst));
        assert!(!coalescer.is_in_flight());

        assert_eq!(coalescer.request(|| async { Ok::<_, io::Error>(5) }).await.unwrap(), 5);
        assert_eq!(coalescer.stats().cancelled, 1);
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let coalescer = RequestCoalescer::<u8>::new("k");
        assert!(!coalescer.cancel());
        assert_eq!(coalescer.stats(), CoalescerStats::default());
    }

    /// A cancelled cycle settling late must not clear a newer cycle.
    #[tokio::test]
    async fn test_stale_cycle_does_not_clear_newer_fetch() {
        let coalescer = RequestCoalescer::<u32>::new("k");
        let (tx, rx) = oneshot::channel::<()>();

        let stale = coalescer.request(|| async { Ok::<_, io::Error>(1) });
        coalescer.cancel();
        let fresh = coalescer.request(move || async move {
            let _ = rx.await;
            Ok::<_, io::Error>(2)
        });

        assert!(matches!(stale.await, Err(CacheError::Cancelled { .. })));
        assert!(coalescer.is_in_flight());

        tx.send(()).unwrap();
        assert_eq!(fresh.await.unwrap(), 2);
        assert!(!coalescer.is_in_flight());
    }
}
