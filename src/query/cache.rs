use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::key::QueryKey;
use crate::errors::ApiError;

/// Type-erased cached payload. Typed access goes through [`CacheEntry`].
pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<Payload, ApiError>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a query needs: its key, how long data stays fresh, and how to fetch.
pub struct QueryDescriptor<T> {
    pub key: QueryKey,
    pub stale_after: Duration,
    fetch_fn: FetchFn<T>,
}

impl<T> Clone for QueryDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            stale_after: self.stale_after,
            fetch_fn: self.fetch_fn.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> QueryDescriptor<T> {
    pub fn new<F, Fut>(key: QueryKey, stale_after: Duration, fetch_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        Self {
            key,
            stale_after,
            fetch_fn: Arc::new(move || fetch_fn().boxed()),
        }
    }

    fn erased(&self) -> BoxFuture<'static, Result<Payload, ApiError>> {
        (self.fetch_fn)()
            .map(|result| result.map(|value| Arc::new(value) as Payload))
            .boxed()
    }
}

/// Untyped state of one key, as broadcast to subscribers.
#[derive(Clone, Default)]
pub struct Snapshot {
    data: Option<Payload>,
    pub status: QueryStatus,
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<Instant>,
    pub stale_after: Duration,
    pub is_fetching: bool,
    pub invalidated: bool,
}

impl Snapshot {
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn typed<T: Send + Sync + 'static>(&self) -> CacheEntry<T> {
        CacheEntry {
            data: self.data.clone().and_then(|p| downcast(p).ok()),
            status: self.status,
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            stale_after: self.stale_after,
            is_fetching: self.is_fetching,
            invalidated: self.invalidated,
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("has_data", &self.data.is_some())
            .field("status", &self.status)
            .field("error", &self.error)
            .field("is_fetching", &self.is_fetching)
            .field("invalidated", &self.invalidated)
            .finish()
    }
}

/// Typed read-only view of a cache slot.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: Option<Arc<T>>,
    pub status: QueryStatus,
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<Instant>,
    pub stale_after: Duration,
    pub is_fetching: bool,
    pub invalidated: bool,
}

impl<T> CacheEntry<T> {
    pub fn is_stale(&self) -> bool {
        is_stale(self.invalidated, self.last_fetched_at, self.stale_after)
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

/// Typed watch on one key.
pub struct QuerySubscription<T> {
    rx: watch::Receiver<Snapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QuerySubscription<T> {
    pub fn current(&self) -> CacheEntry<T> {
        self.rx.borrow().typed()
    }

    /// Wait for the next transition. Errors once the slot is dropped.
    pub async fn changed(&mut self) -> Result<CacheEntry<T>, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().typed())
    }
}

fn is_stale(invalidated: bool, last_fetched_at: Option<Instant>, stale_after: Duration) -> bool {
    invalidated
        || last_fetched_at.is_none_or(|at| Instant::now().duration_since(at) >= stale_after)
}

fn downcast<T: Send + Sync + 'static>(payload: Payload) -> Result<Arc<T>, ApiError> {
    payload.downcast::<T>().map_err(|_| {
        ApiError::Decode(format!(
            "cached value is not a {}",
            std::any::type_name::<T>()
        ))
    })
}

struct InFlight {
    ticket: u64,
    future: SharedFetch,
}

pub(crate) struct Slot {
    pub(crate) data: Option<Payload>,
    status: QueryStatus,
    error: Option<ApiError>,
    last_fetched_at: Option<Instant>,
    stale_after: Duration,
    invalidated: bool,
    /// Ticket of the last write applied to `data`. Results carrying a lower
    /// ticket were issued earlier and are dropped.
    pub(crate) applied_ticket: u64,
    in_flight: Option<InFlight>,
    tx: watch::Sender<Snapshot>,
}

impl Slot {
    fn new(stale_after: Duration, born_at: u64) -> Self {
        let (tx, _rx) = watch::channel(Snapshot {
            stale_after,
            ..Snapshot::default()
        });
        Self {
            data: None,
            status: QueryStatus::Idle,
            error: None,
            last_fetched_at: None,
            stale_after,
            invalidated: false,
            applied_ticket: born_at,
            in_flight: None,
            tx,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            stale_after: self.stale_after,
            is_fetching: self.in_flight.is_some(),
            invalidated: self.invalidated,
        }
    }

    pub(crate) fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }

    fn is_stale(&self) -> bool {
        is_stale(self.invalidated, self.last_fetched_at, self.stale_after)
    }

    pub(crate) fn set_data(&mut self, data: Option<Payload>) {
        self.status = if data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        };
        self.error = None;
        self.data = data;
    }
}

pub(crate) struct CacheState {
    pub(crate) slots: HashMap<QueryKey, Slot>,
    ticket_counter: u64,
    default_stale: Duration,
}

impl CacheState {
    pub(crate) fn slot(&mut self, key: &QueryKey, stale_after: Option<Duration>) -> &mut Slot {
        let born_at = self.ticket_counter;
        let stale_after = stale_after.unwrap_or(self.default_stale);
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(stale_after, born_at))
    }

    /// Issue a write ticket for `key`, creating the slot first so that a
    /// fresh slot only accepts results issued after it.
    pub(crate) fn ticketed_slot(
        &mut self,
        key: &QueryKey,
        stale_after: Option<Duration>,
    ) -> (u64, &mut Slot) {
        let born_at = self.ticket_counter;
        self.ticket_counter += 1;
        let ticket = self.ticket_counter;
        let stale_after = stale_after.unwrap_or(self.default_stale);
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(stale_after, born_at));
        (ticket, slot)
    }
}

/// Process-wide keyed cache of query results.
///
/// Every slot is guarded by one short `std::sync::Mutex` section that is
/// never held across an `.await`. Fetches are spawned onto the runtime, so
/// a fetch runs to completion even if every caller stops waiting for it;
/// its result is applied only if nothing newer was written in the meantime.
#[derive(Clone)]
pub struct QueryCache {
    pub(crate) state: Arc<Mutex<CacheState>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl QueryCache {
    pub fn new(default_stale: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                slots: HashMap::new(),
                ticket_counter: 0,
                default_stale,
            })),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the current entry without waiting, starting a fetch when the
    /// key is absent or stale and nothing is in flight.
    pub fn observe<T: Send + Sync + 'static>(&self, desc: &QueryDescriptor<T>) -> CacheEntry<T> {
        let mut state = self.lock();
        let (ticket, slot) = state.ticketed_slot(&desc.key, Some(desc.stale_after));
        slot.stale_after = desc.stale_after;
        if slot.in_flight.is_none() && (slot.data.is_none() || slot.is_stale()) {
            self.start_fetch(slot, &desc.key, ticket, desc.erased());
        }
        slot.snapshot().typed()
    }

    /// Resolve a query.
    ///
    /// Fresh data is returned as is. Stale data is returned immediately and
    /// one background revalidation is started. Without data the call waits,
    /// joining the in-flight fetch for the key if there is one.
    pub async fn fetch<T: Send + Sync + 'static>(
        &self,
        desc: &QueryDescriptor<T>,
    ) -> Result<Arc<T>, ApiError> {
        let waiter = {
            let mut state = self.lock();
            let (ticket, slot) = state.ticketed_slot(&desc.key, Some(desc.stale_after));
            slot.stale_after = desc.stale_after;

            if let Some(data) = slot.data.clone() {
                if slot.is_stale() && slot.in_flight.is_none() {
                    debug!(key = %desc.key, "Serving stale data, revalidating");
                    self.start_fetch(slot, &desc.key, ticket, desc.erased());
                }
                return downcast(data);
            }

            match &slot.in_flight {
                Some(in_flight) => {
                    debug!(key = %desc.key, "Joining in-flight fetch");
                    in_flight.future.clone()
                }
                None => self.start_fetch(slot, &desc.key, ticket, desc.erased()),
            }
        };
        let payload = waiter.await?;
        downcast(self.latest_or(&desc.key, payload))
    }

    /// Force a new fetch that supersedes whatever is in flight, and wait
    /// for it.
    pub async fn refetch<T: Send + Sync + 'static>(
        &self,
        desc: &QueryDescriptor<T>,
    ) -> Result<Arc<T>, ApiError> {
        let waiter = {
            let mut state = self.lock();
            let (ticket, slot) = state.ticketed_slot(&desc.key, Some(desc.stale_after));
            slot.stale_after = desc.stale_after;
            self.start_fetch(slot, &desc.key, ticket, desc.erased())
        };
        let payload = waiter.await?;
        downcast(self.latest_or(&desc.key, payload))
    }

    fn start_fetch(
        &self,
        slot: &mut Slot,
        key: &QueryKey,
        ticket: u64,
        fetch: BoxFuture<'static, Result<Payload, ApiError>>,
    ) -> SharedFetch {
        let cache = self.clone();
        let key = key.clone();
        let future = async move {
            let result = fetch.await;
            cache.complete(&key, ticket, &result);
            result
        }
        .boxed()
        .shared();

        if slot.data.is_none() {
            slot.status = QueryStatus::Loading;
        }
        slot.in_flight = Some(InFlight {
            ticket,
            future: future.clone(),
        });
        slot.publish();

        tokio::spawn(future.clone());
        future
    }

    fn complete(&self, key: &QueryKey, ticket: u64, result: &Result<Payload, ApiError>) {
        let mut state = self.lock();
        let Some(slot) = state.slots.get_mut(key) else {
            debug!(%key, "Dropping result for removed key");
            return;
        };
        let was_current = slot.in_flight.as_ref().is_some_and(|f| f.ticket == ticket);
        if was_current {
            slot.in_flight = None;
        }
        if ticket <= slot.applied_ticket {
            debug!(%key, ticket, applied = slot.applied_ticket, "Dropping superseded result");
            if was_current {
                slot.publish();
            }
            return;
        }

        match result {
            Ok(payload) => {
                slot.data = Some(payload.clone());
                slot.status = QueryStatus::Success;
                slot.error = None;
                slot.last_fetched_at = Some(Instant::now());
                slot.invalidated = false;
            }
            Err(e) => {
                warn!(%key, error = %e, "Query failed");
                slot.status = QueryStatus::Error;
                slot.error = Some(e.clone());
            }
        }
        slot.applied_ticket = ticket;
        slot.publish();
    }

    /// The slot's data if present, else `fallback`. A caller that waited on
    /// a superseded fetch still sees the winning value.
    fn latest_or(&self, key: &QueryKey, fallback: Payload) -> Payload {
        self.lock()
            .slots
            .get(key)
            .and_then(|slot| slot.data.clone())
            .unwrap_or(fallback)
    }

    pub fn entry<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<CacheEntry<T>> {
        self.lock().slots.get(key).map(|slot| slot.snapshot().typed())
    }

    pub fn get_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.entry::<T>(key).and_then(|entry| entry.data)
    }

    /// Write data directly, superseding any in-flight fetch.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
        let mut state = self.lock();
        let (ticket, slot) = state.ticketed_slot(key, None);
        slot.set_data(Some(Arc::new(value)));
        slot.last_fetched_at = Some(Instant::now());
        slot.invalidated = false;
        slot.applied_ticket = ticket;
        slot.publish();
    }

    pub fn subscribe<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QuerySubscription<T> {
        let mut state = self.lock();
        let slot = state.slot(key, None);
        QuerySubscription {
            rx: slot.tx.subscribe(),
            _marker: PhantomData,
        }
    }

    /// Mark every entry of the named resources stale. Data is kept and
    /// served until the next read revalidates it. Returns how many entries
    /// were marked.
    pub fn invalidate(&self, resources: &[&str]) -> usize {
        if resources.is_empty() {
            return 0;
        }
        let names: HashSet<&str> = resources.iter().copied().collect();
        let mut state = self.lock();
        let mut marked = 0;
        for (key, slot) in state.slots.iter_mut() {
            if names.contains(key.resource()) {
                slot.invalidated = true;
                slot.publish();
                marked += 1;
            }
        }
        debug!(?resources, marked, "Invalidated queries");
        marked
    }

    pub fn invalidate_key(&self, key: &QueryKey) -> bool {
        let mut state = self.lock();
        match state.slots.get_mut(key) {
            Some(slot) => {
                slot.invalidated = true;
                slot.publish();
                true
            }
            None => false,
        }
    }

    /// Drop one entry. Its in-flight fetch, if any, is discarded on arrival.
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.lock().slots.remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut state = self.lock();
        let dropped = state.slots.len();
        state.slots.clear();
        debug!(dropped, "Query cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
