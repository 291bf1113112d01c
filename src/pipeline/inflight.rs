//! Transient table of resolutions in progress
//!
//! Concurrent requests for the same key share one backend resolution. The
//! table only holds work that has not finished; results live in the cache
//! and failures are dropped with their flight.

use crate::cache::{CacheKey, Resource};
use crate::error::Result;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A resolution that any number of callers can await
pub type SharedResolve = Shared<BoxFuture<'static, Result<Resource>>>;

/// Map of key to the resolution currently producing it
#[derive(Default)]
pub struct InFlight {
    next_id: AtomicU64,
    pending: Mutex<HashMap<CacheKey, (u64, SharedResolve)>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the flight for `key`, or start one with `start`
    ///
    /// `start` receives the flight id to pass to [`InFlight::finish`].
    /// Returns the shared resolution and whether this caller started it.
    pub fn join_or_start<F>(&self, key: &str, start: F) -> (SharedResolve, bool)
    where
        F: FnOnce(u64) -> SharedResolve,
    {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());

        if let Some((_, flight)) = pending.get(key) {
            return (flight.clone(), false);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let flight = start(id);
        pending.insert(key.to_string(), (id, flight.clone()));
        (flight, true)
    }

    /// Drop the flight for `key` if it is still flight `id`
    pub fn finish(&self, key: &str, id: u64) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(pending.get(key), Some((current, _)) if *current == id) {
            pending.remove(key);
        }
    }

    /// Number of resolutions in progress
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ResolvedFormat;
    use futures::FutureExt;

    fn ready(reference: &'static str) -> SharedResolve {
        async move {
            Ok::<_, crate::error::AssetError>(Resource::new(
                reference,
                ResolvedFormat::Jpeg,
                1,
                1,
                vec![0u8],
            ))
        }
        .boxed()
        .shared()
    }

    #[tokio::test]
    async fn test_second_caller_joins_existing_flight() {
        let table = InFlight::new();

        let (first, leader) = table.join_or_start("k", |_| ready("k"));
        assert!(leader);

        let (second, leader) = table.join_or_start("k", |_| panic!("must not start twice"));
        assert!(!leader);
        assert_eq!(table.len(), 1);

        let (a, b) = futures::join!(first, second);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_finish_ignores_stale_id() {
        let table = InFlight::new();

        let mut first_id = 0;
        table.join_or_start("k", |id| {
            first_id = id;
            ready("k")
        });
        table.finish("k", first_id + 100);
        assert_eq!(table.len(), 1);

        table.finish("k", first_id);
        assert!(table.is_empty());
    }
}
