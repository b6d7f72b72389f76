use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::cache::{Payload, QueryCache};
use super::key::QueryKey;
use crate::errors::ApiError;

impl QueryCache {
    /// Optimistically write `optimistic` to `key`, then run `commit`.
    ///
    /// On success every entry whose resource is listed in `invalidates` is
    /// marked stale. On failure the previous value is restored, unless a
    /// newer write to the key landed while the commit was in flight, and the
    /// error is returned.
    pub async fn mutate<T, R, Fut>(
        &self,
        key: &QueryKey,
        optimistic: T,
        commit: Fut,
        invalidates: &[&str],
    ) -> Result<R, ApiError>
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>>,
    {
        let (ticket, previous) = self.write_optimistic(key, Arc::new(optimistic));

        match commit.await {
            Ok(value) => {
                self.invalidate(invalidates);
                Ok(value)
            }
            Err(e) => {
                self.roll_back(key, ticket, previous, &e);
                Err(e)
            }
        }
    }

    /// Like [`mutate`](Self::mutate), deriving the optimistic value from the
    /// cached one. With nothing cached the commit runs without an optimistic
    /// write.
    pub async fn mutate_with<T, R, F, Fut>(
        &self,
        key: &QueryKey,
        update: F,
        commit: Fut,
        invalidates: &[&str],
    ) -> Result<R, ApiError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&T) -> T,
        Fut: Future<Output = Result<R, ApiError>>,
    {
        match self.get_data::<T>(key) {
            Some(current) => {
                let next = update(&current);
                self.mutate(key, next, commit, invalidates).await
            }
            None => {
                let value = commit.await?;
                self.invalidate(invalidates);
                Ok(value)
            }
        }
    }

    fn write_optimistic(&self, key: &QueryKey, value: Payload) -> (u64, Option<Payload>) {
        let mut state = self.lock();
        let (ticket, slot) = state.ticketed_slot(key, None);
        let previous = slot.data.clone();
        slot.set_data(Some(value));
        slot.applied_ticket = ticket;
        slot.publish();
        debug!(%key, ticket, "Applied optimistic write");
        (ticket, previous)
    }

    fn roll_back(&self, key: &QueryKey, ticket: u64, previous: Option<Payload>, error: &ApiError) {
        let mut state = self.lock();
        let Some(slot) = state.slots.get_mut(key) else {
            return;
        };
        if slot.applied_ticket != ticket {
            debug!(%key, ticket, "Optimistic write superseded, skipping rollback");
            return;
        }
        slot.set_data(previous);
        slot.publish();
        warn!(%key, error = %error, "Mutation failed, rolled back");
    }
}
