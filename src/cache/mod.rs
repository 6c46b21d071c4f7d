//! Keyed in-memory cache of server-derived data.
//!
//! Entries are eventually consistent with the server: stale between
//! invalidation and refetch completion, but never racing incoherently. The
//! last completed write for a key wins, and concurrent fetches for an
//! identical key are coalesced into the single outstanding request.
//!
//! Unlike the cooperative single-threaded UI runtime this layer was designed
//! for, tokio schedules real threads, so all map and entry mutation sits
//! behind explicit locks and no lock is held across a suspension point.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::errors::ApiError;

/// Cache key: resource identifier plus the serialized parameter list, ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: &'static str,
    params: Vec<String>,
}

impl QueryKey {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    pub fn with_params<I, S>(resource: &'static str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource,
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.resource, self.params.join(","))
    }
}

/// Per-query fetch policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Entries younger than this are served without a network call. `None`
    /// means a cached entry stays fresh until explicitly invalidated.
    pub stale_time: Option<Duration>,
    /// Transparent refetch attempts on transient failure before the error
    /// surfaces to the caller.
    pub retries: u32,
}

impl QueryOptions {
    pub fn stale_after(stale_time: Duration) -> Self {
        Self {
            stale_time: Some(stale_time),
            retries: 0,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

type Stored = Arc<dyn Any + Send + Sync>;

/// One cache entry. `inflight` carries the completion signal of the single
/// outstanding fetch; waiters coalesce on it instead of fetching themselves.
struct Slot {
    value: Option<Stored>,
    fetched_at: Option<Instant>,
    stale: bool,
    last_error: Option<ApiError>,
    inflight: Option<watch::Receiver<bool>>,
    epoch: u64,
    epoch_tx: watch::Sender<u64>,
}

impl Slot {
    fn new() -> Self {
        let (epoch_tx, _) = watch::channel(0);
        Self {
            value: None,
            fetched_at: None,
            stale: false,
            last_error: None,
            inflight: None,
            epoch: 0,
            epoch_tx,
        }
    }

    fn fresh_value(&self, options: &QueryOptions) -> Option<Stored> {
        if self.stale {
            return None;
        }
        let (value, fetched_at) = match (&self.value, self.fetched_at) {
            (Some(value), Some(at)) => (value, at),
            _ => return None,
        };
        let within_window = options
            .stale_time
            .map_or(true, |window| fetched_at.elapsed() < window);
        within_window.then(|| Arc::clone(value))
    }
}

/// Type-erased handle to an infinite query plus its reset hook, so
/// `invalidate` can clear pages without knowing the page type.
struct InfiniteEntry {
    handle: Arc<dyn Any + Send + Sync>,
    reset: Box<dyn Fn() + Send + Sync>,
}

/// Keyed query/mutation cache shared by all consumers of server data.
pub struct QueryClient {
    slots: Mutex<HashMap<QueryKey, Slot>>,
    infinite: Mutex<HashMap<QueryKey, InfiniteEntry>>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClient {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            infinite: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch-or-serve for a single-valued key.
    ///
    /// A fresh cached entry is returned without a network call. Otherwise the
    /// caller either claims the fetch or, when one is already outstanding for
    /// this key, waits on it and observes the same result, including failure.
    pub async fn query<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> Result<Arc<T>, ApiError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        loop {
            enum Plan {
                Hit(Stored),
                Wait(watch::Receiver<bool>),
                Fetch(watch::Sender<bool>),
            }

            let plan = {
                let mut slots = self.slots.lock().expect("cache mutex poisoned");
                let slot = slots.entry(key.clone()).or_insert_with(Slot::new);

                // Drop a completion channel whose owner vanished mid-fetch.
                if matches!(&slot.inflight, Some(rx) if rx.has_changed().is_err()) {
                    slot.inflight = None;
                }

                if let Some(value) = slot.fresh_value(&options) {
                    Plan::Hit(value)
                } else if let Some(rx) = &slot.inflight {
                    Plan::Wait(rx.clone())
                } else {
                    let (tx, rx) = watch::channel(false);
                    slot.inflight = Some(rx);
                    Plan::Fetch(tx)
                }
            };

            match plan {
                Plan::Hit(value) => return Self::downcast(value),
                Plan::Wait(mut rx) => {
                    // Either the owner completed (signal) or was dropped
                    // (channel closed); both mean the slot can be re-read.
                    let _ = rx.changed().await;
                    let outcome = {
                        let slots = self.slots.lock().expect("cache mutex poisoned");
                        slots.get(&key).and_then(|slot| {
                            if let Some(err) = &slot.last_error {
                                Some(Err(err.clone()))
                            } else {
                                slot.value.as_ref().map(|v| Ok(Arc::clone(v)))
                            }
                        })
                    };
                    match outcome {
                        Some(Ok(value)) => return Self::downcast(value),
                        Some(Err(err)) => return Err(err),
                        // Owner never wrote anything; contend for the fetch.
                        None => continue,
                    }
                }
                Plan::Fetch(tx) => {
                    let result = Self::run_fetch(&options, &fetcher).await;
                    let mut slots = self.slots.lock().expect("cache mutex poisoned");
                    let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
                    slot.inflight = None;
                    let outcome = match result {
                        Ok(value) => {
                            let stored: Stored = Arc::new(value);
                            slot.value = Some(Arc::clone(&stored));
                            slot.fetched_at = Some(Instant::now());
                            slot.stale = false;
                            slot.last_error = None;
                            tracing::debug!(key = %key, "cache entry refreshed");
                            Self::downcast(stored)
                        }
                        Err(err) => {
                            slot.last_error = Some(err.clone());
                            Err(err)
                        }
                    };
                    let _ = tx.send(true);
                    return outcome;
                }
            }
        }
    }

    /// Run a mutation; on success mark each listed key stale so subscribed
    /// consumers refetch. A failed mutation invalidates nothing.
    pub async fn mutate<T, F, Fut>(
        &self,
        fetcher: F,
        invalidate_on_success: &[QueryKey],
    ) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let value = fetcher().await?;
        for key in invalidate_on_success {
            self.invalidate(key);
        }
        Ok(value)
    }

    /// Mark a key stale and wake its subscribers. Infinite queries under the
    /// key lose their accumulated pages and restart from page 1.
    pub fn invalidate(&self, key: &QueryKey) {
        {
            let mut slots = self.slots.lock().expect("cache mutex poisoned");
            if let Some(slot) = slots.get_mut(key) {
                slot.stale = true;
                slot.epoch += 1;
                let _ = slot.epoch_tx.send(slot.epoch);
            }
        }
        let infinite = self.infinite.lock().expect("cache mutex poisoned");
        if let Some(entry) = infinite.get(key) {
            (entry.reset)();
        }
        tracing::debug!(key = %key, "cache key invalidated");
    }

    /// Watch a key's invalidation epoch; the value changes every time the key
    /// is invalidated, signalling live consumers to refetch.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<u64> {
        let mut slots = self.slots.lock().expect("cache mutex poisoned");
        let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
        slot.epoch_tx.subscribe()
    }

    /// The infinite-query handle for a key, created on first use. The handle
    /// is shared: all consumers of the key see the same ordered page list.
    pub fn infinite_query<P>(&self, key: &QueryKey) -> Arc<InfiniteQuery<P>>
    where
        P: Paged + Send + Sync + 'static,
    {
        let mut infinite = self.infinite.lock().expect("cache mutex poisoned");
        if let Some(entry) = infinite.get(key) {
            if let Ok(handle) = Arc::clone(&entry.handle).downcast::<InfiniteQuery<P>>() {
                return handle;
            }
        }
        let handle = Arc::new(InfiniteQuery::<P>::new(key.clone()));
        let reset_handle = Arc::clone(&handle);
        infinite.insert(
            key.clone(),
            InfiniteEntry {
                handle: handle.clone(),
                reset: Box::new(move || reset_handle.reset()),
            },
        );
        handle
    }

    async fn run_fetch<T, F, Fut>(options: &QueryOptions, fetcher: &F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0;
        loop {
            match fetcher().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < options.retries && err.is_transient() => {
                    attempt += 1;
                    tracing::debug!(%err, attempt, "transient fetch failure, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn downcast<T: Send + Sync + 'static>(value: Stored) -> Result<Arc<T>, ApiError> {
        value
            .downcast::<T>()
            .map_err(|_| ApiError::Client("cache entry type mismatch".to_string()))
    }
}

/// Implemented by page payloads so the cache can read the `hasMore` flag.
pub trait Paged {
    fn has_more(&self) -> bool;
}

/// Outcome of a [`InfiniteQuery::fetch_next_page`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFetch {
    /// A page was fetched and appended
    Appended,
    /// No-op: a fetch was already in flight or the last page had no successor
    Skipped,
    /// The completion arrived after a reset and was discarded
    Discarded,
}

struct InfiniteState<P> {
    pages: Vec<Arc<P>>,
    has_more: bool,
    in_flight: bool,
    generation: u64,
}

/// Ordered accumulation of successive pages under one logical key.
///
/// Page parameters count from 1 and page N is never inserted before page N-1
/// resolves: only one fetch may be outstanding, and a completion whose
/// generation no longer matches (a reset raced it) is discarded.
pub struct InfiniteQuery<P> {
    key: QueryKey,
    state: Mutex<InfiniteState<P>>,
}

impl<P: Paged> InfiniteQuery<P> {
    fn new(key: QueryKey) -> Self {
        Self {
            key,
            state: Mutex::new(InfiniteState {
                pages: Vec::new(),
                has_more: true,
                in_flight: false,
                generation: 0,
            }),
        }
    }

    /// Fetch the next page, a no-op while a fetch is outstanding or after the
    /// last page reported no successor. The fetcher receives the 1-based page
    /// parameter.
    pub async fn fetch_next_page<F, Fut>(&self, fetcher: F) -> Result<PageFetch, ApiError>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Result<P, ApiError>>,
    {
        let (page_param, generation) = {
            let mut state = self.state.lock().expect("infinite query mutex poisoned");
            if state.in_flight || !state.has_more {
                return Ok(PageFetch::Skipped);
            }
            state.in_flight = true;
            (state.pages.len() as u32 + 1, state.generation)
        };

        let result = fetcher(page_param).await;

        let mut state = self.state.lock().expect("infinite query mutex poisoned");
        if state.generation != generation {
            // The key was invalidated while this fetch was outstanding; the
            // new generation owns `in_flight`, leave it untouched.
            tracing::debug!(key = %self.key, page_param, "discarding stale page completion");
            return Ok(PageFetch::Discarded);
        }
        state.in_flight = false;
        match result {
            Ok(page) => {
                state.has_more = page.has_more();
                state.pages.push(Arc::new(page));
                Ok(PageFetch::Appended)
            }
            Err(err) => Err(err),
        }
    }

    /// Snapshot of the accumulated pages, in request order.
    pub fn pages(&self) -> Vec<Arc<P>> {
        self.state
            .lock()
            .expect("infinite query mutex poisoned")
            .pages
            .clone()
    }

    /// Whether the last fetched page reported a successor.
    pub fn has_next_page(&self) -> bool {
        self.state
            .lock()
            .expect("infinite query mutex poisoned")
            .has_more
    }

    pub fn is_fetching(&self) -> bool {
        self.state
            .lock()
            .expect("infinite query mutex poisoned")
            .in_flight
    }

    /// Drop all pages and start over from page 1.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("infinite query mutex poisoned");
        state.pages.clear();
        state.has_more = true;
        state.in_flight = false;
        state.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq)]
    struct Page {
        items: Vec<u32>,
        has_more: bool,
    }

    impl Paged for Page {
        fn has_more(&self) -> bool {
            self.has_more
        }
    }

    fn key() -> QueryKey {
        QueryKey::with_params("test", ["a"])
    }

    #[tokio::test]
    async fn test_query_caches_value() {
        let cache = QueryClient::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .query(key(), QueryOptions::default(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(42u32)
                })
                .await
                .unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_queries_share_one_fetch() {
        let cache = Arc::new(QueryClient::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            tasks.push(tokio::spawn(async move {
                cache
                    .query(key(), QueryOptions::default(), move || {
                        let calls = Arc::clone(&calls);
                        let gate = Arc::clone(&gate);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            gate.notified().await;
                            Ok::<_, ApiError>("shared".to_string())
                        }
                    })
                    .await
            }));
        }

        // Let every task reach the cache before releasing the fetch.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_waiters();

        for task in tasks {
            let value = task.await.unwrap().unwrap();
            assert_eq!(*value, "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_coalesced_waiters_observe_failure() {
        let cache = Arc::new(QueryClient::new());
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let owner = {
            let cache = Arc::clone(&cache);
            let gate = Arc::clone(&gate);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .query(key(), QueryOptions::default(), move || {
                        let gate = Arc::clone(&gate);
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            gate.notified().await;
                            Err::<u32, _>(ApiError::Api("nope".into()))
                        }
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let waiter = {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .query(key(), QueryOptions::default(), move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(0u32)
                        }
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_waiters();

        assert!(matches!(owner.await.unwrap(), Err(ApiError::Api(_))));
        assert!(matches!(waiter.await.unwrap(), Err(ApiError::Api(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_time_window() {
        let cache = QueryClient::new();
        let calls = AtomicUsize::new(0);
        let options = QueryOptions::stale_after(Duration::from_secs(300));
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(1u32)
        };

        cache.query(key(), options, fetch).await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        cache.query(key(), options, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "entry still fresh");

        tokio::time::advance(Duration::from_secs(300)).await;
        cache.query(key(), options, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2, "aged entry refetched");
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch_and_wakes_subscriber() {
        let cache = QueryClient::new();
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(1u32)
        };

        cache.query(key(), QueryOptions::default(), fetch).await.unwrap();
        let epoch_rx = cache.subscribe(&key());

        cache.invalidate(&key());
        assert!(epoch_rx.has_changed().unwrap());

        cache.query(key(), QueryOptions::default(), fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_on_transient_failure_only() {
        let cache = QueryClient::new();
        let calls = AtomicUsize::new(0);

        let value = cache
            .query(
                key(),
                QueryOptions::default().with_retries(2),
                || async {
                    match calls.fetch_add(1, Ordering::SeqCst) {
                        0 | 1 => Err(ApiError::Network("flaky".into())),
                        _ => Ok(7u32),
                    }
                },
            )
            .await
            .unwrap();
        assert_eq!(*value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Non-transient failures surface immediately.
        let calls = AtomicUsize::new(0);
        let result = cache
            .query(
                QueryKey::new("other"),
                QueryOptions::default().with_retries(2),
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(ApiError::Api("bad request".into()))
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mutate_invalidates_only_on_success() {
        let cache = QueryClient::new();
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(1u32)
        };

        cache.query(key(), QueryOptions::default(), fetch).await.unwrap();

        let failed: Result<(), _> = cache
            .mutate(|| async { Err(ApiError::Api("denied".into())) }, &[key()])
            .await;
        assert!(failed.is_err());
        cache.query(key(), QueryOptions::default(), fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "failed mutation must not invalidate");

        cache
            .mutate(|| async { Ok::<_, ApiError>(()) }, &[key()])
            .await
            .unwrap();
        cache.query(key(), QueryOptions::default(), fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_infinite_pages_append_in_order() {
        let cache = QueryClient::new();
        let query = cache.infinite_query::<Page>(&key());

        query
            .fetch_next_page(|page| async move {
                assert_eq!(page, 1);
                Ok(Page {
                    items: vec![1, 2],
                    has_more: true,
                })
            })
            .await
            .unwrap();
        query
            .fetch_next_page(|page| async move {
                assert_eq!(page, 2);
                Ok(Page {
                    items: vec![3],
                    has_more: false,
                })
            })
            .await
            .unwrap();

        let items: Vec<u32> = query
            .pages()
            .iter()
            .flat_map(|p| p.items.clone())
            .collect();
        assert_eq!(items, vec![1, 2, 3]);
        assert!(!query.has_next_page());

        // Exhausted: further calls are no-ops.
        let fetched = AtomicUsize::new(0);
        let outcome = query
            .fetch_next_page(|_| async {
                fetched.fetch_add(1, Ordering::SeqCst);
                Ok(Page {
                    items: vec![],
                    has_more: false,
                })
            })
            .await
            .unwrap();
        assert_eq!(outcome, PageFetch::Skipped);
        assert_eq!(fetched.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_fetch_next_page_is_noop_while_first_outstanding() {
        let cache = Arc::new(QueryClient::new());
        let query = cache.infinite_query::<Page>(&key());
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let query = Arc::clone(&query);
            let gate = Arc::clone(&gate);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                query
                    .fetch_next_page(move |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(Page {
                            items: vec![1],
                            has_more: true,
                        })
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = {
            let calls = Arc::clone(&calls);
            query
                .fetch_next_page(move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Page {
                        items: vec![2],
                        has_more: true,
                    })
                })
                .await
                .unwrap()
        };
        assert_eq!(second, PageFetch::Skipped);

        gate.notify_waiters();
        assert_eq!(first.await.unwrap().unwrap(), PageFetch::Appended);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_discards_stale_completion() {
        let cache = Arc::new(QueryClient::new());
        let query = cache.infinite_query::<Page>(&key());
        let gate = Arc::new(Notify::new());

        let stale = {
            let query = Arc::clone(&query);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                query
                    .fetch_next_page(move |_| async move {
                        gate.notified().await;
                        Ok(Page {
                            items: vec![99],
                            has_more: true,
                        })
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.invalidate(&key());
        gate.notify_waiters();

        assert_eq!(stale.await.unwrap().unwrap(), PageFetch::Discarded);
        assert!(query.pages().is_empty(), "stale page must not be applied");
        assert!(query.has_next_page());
        assert!(!query.is_fetching());
    }

    #[tokio::test]
    async fn test_infinite_handle_is_shared_per_key() {
        let cache = QueryClient::new();
        let a = cache.infinite_query::<Page>(&key());
        let b = cache.infinite_query::<Page>(&key());
        assert!(Arc::ptr_eq(&a, &b));
    }
}
