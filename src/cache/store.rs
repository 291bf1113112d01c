//! Bounded asset cache with age-based expiry and FIFO eviction

use crate::cache::{
    clock::{Clock, SystemClock},
    config::CacheConfig,
    entry::CacheEntry,
    invalidation::{InvalidationEvent, InvalidationReason},
    types::{CacheKey, CacheStats, Resource},
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Bounded key to resource store
///
/// - Thread-safe async access via RwLock
/// - Entries at least `max_age` old are misses and are dropped on read
/// - When full, the entry inserted earliest is evicted; reads do not
///   refresh an entry's position
/// - A periodic sweep reclaims entries that are never read again
pub struct AssetCache {
    /// Cache configuration
    config: CacheConfig,

    /// Time source for entry ages
    clock: Arc<dyn Clock>,

    /// Internal storage
    store: RwLock<CacheStore>,
}

/// Internal cache storage
struct CacheStore {
    /// Main storage: key -> entry
    entries: HashMap<CacheKey, CacheEntry>,

    /// Keys in insertion order, oldest at the front
    insertion_order: VecDeque<CacheKey>,

    /// Current cache statistics
    stats: CacheStats,

    /// Total size of cached data in bytes
    current_size_bytes: usize,
}

impl CacheStore {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.insertion_order.retain(|k| k != key);
        self.current_size_bytes = self.current_size_bytes.saturating_sub(entry.size_bytes());
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<CacheEntry> {
        let key = self.insertion_order.pop_front()?;
        let entry = self.entries.remove(&key)?;
        self.current_size_bytes = self.current_size_bytes.saturating_sub(entry.size_bytes());
        Some(entry)
    }

    fn refresh_gauges(&mut self) {
        self.stats.entries = self.entries.len();
        self.stats.size_bytes = self.current_size_bytes;
    }
}

impl AssetCache {
    /// Create a new cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache that reads time from `clock`
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        info!("Initializing asset cache with config: {:?}", config);

        let store = CacheStore {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            stats: CacheStats::default(),
            current_size_bytes: 0,
        };

        Self {
            config,
            clock,
            store: RwLock::new(store),
        }
    }

    /// Cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a fresh entry
    ///
    /// A stale entry counts as a miss and is removed.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut store = self.store.write().await;

        let fresh = match store.entries.get(key) {
            Some(entry) => entry.is_fresh(now, self.config.max_age),
            None => {
                debug!("Cache miss: {}", key);
                self.count(&mut store, |s| s.misses += 1);
                return None;
            }
        };

        if !fresh {
            debug!("Cache entry expired: {}", key);
            store.remove(key);
            self.count(&mut store, |s| {
                s.misses += 1;
                s.evictions_expired += 1;
            });
            store.refresh_gauges();
            return None;
        }

        let entry = store.entries.get(key).cloned();
        if let Some(remaining) = entry
            .as_ref()
            .and_then(|e| e.time_until_expiration(now, self.config.max_age))
        {
            debug!("Cache hit: {} (stale in {}s)", key, remaining.as_secs());
        }
        self.count(&mut store, |s| s.hits += 1);
        entry
    }

    /// Look up a fresh resource
    pub async fn get_resource(&self, key: &str) -> Option<Resource> {
        self.get(key).await.map(|entry| entry.resource)
    }

    /// Check for a fresh entry without touching statistics or evicting
    pub async fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        let store = self.store.read().await;
        store
            .entries
            .get(key)
            .map(|entry| entry.is_fresh(now, self.config.max_age))
            .unwrap_or(false)
    }

    /// Insert or replace the entry for `key`
    ///
    /// Replacing an entry resets both its age and its eviction position.
    /// When the cache is full the earliest insertion is evicted first; the
    /// evicted keys are returned as a [`InvalidationReason::Capacity`] event.
    pub async fn put(&self, key: CacheKey, resource: Resource) -> Option<InvalidationEvent> {
        let now = self.clock.now();
        let entry = CacheEntry::new(key.clone(), resource, now);
        let size = entry.size_bytes();

        let mut store = self.store.write().await;

        if store.remove(&key).is_some() {
            debug!("Replacing cache entry: {}", key);
        }

        let mut evicted_keys = Vec::new();
        while store.entries.len() >= self.config.max_entries.max(1) {
            match store.evict_oldest() {
                Some(evicted) => {
                    debug!("Evicting entry due to capacity: {}", evicted.key);
                    self.count(&mut store, |s| s.evictions_capacity += 1);
                    evicted_keys.push(evicted.key);
                }
                None => break,
            }
        }

        debug!("Inserting cache entry: {}", key);
        store.entries.insert(key.clone(), entry);
        store.insertion_order.push_back(key);
        store.current_size_bytes += size;
        store.refresh_gauges();

        debug_assert!(store.entries.len() <= self.config.max_entries.max(1));
        debug_assert_eq!(store.entries.len(), store.insertion_order.len());

        if evicted_keys.is_empty() {
            None
        } else {
            Some(InvalidationEvent::new(
                InvalidationReason::Capacity,
                evicted_keys,
                now,
            ))
        }
    }

    /// Remove the entry for `key`
    ///
    /// Returns a [`InvalidationReason::Manual`] event if an entry was present.
    pub async fn invalidate(&self, key: &str) -> Option<InvalidationEvent> {
        let mut store = self.store.write().await;

        store.remove(key)?;
        self.count(&mut store, |s| s.invalidations += 1);
        store.refresh_gauges();
        debug!("Invalidated cache entry: {}", key);

        Some(InvalidationEvent::new(
            InvalidationReason::Manual,
            vec![key.to_string()],
            self.clock.now(),
        ))
    }

    /// Remove every entry at least `max_age` old
    pub async fn sweep(&self) -> Vec<InvalidationEvent> {
        let now = self.clock.now();
        let mut store = self.store.write().await;

        let expired_keys: Vec<CacheKey> = store
            .insertion_order
            .iter()
            .filter(|key| {
                store
                    .entries
                    .get(key.as_str())
                    .map(|entry| !entry.is_fresh(now, self.config.max_age))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        if expired_keys.is_empty() {
            return Vec::new();
        }

        for key in &expired_keys {
            store.remove(key);
        }
        let count = expired_keys.len() as u64;
        self.count(&mut store, |s| s.evictions_expired += count);
        store.refresh_gauges();

        debug!("Swept {} expired entries", expired_keys.len());
        vec![
            InvalidationEvent::new(InvalidationReason::Expired, expired_keys, now)
                .with_context(format!("Swept {} expired entries", count)),
        ]
    }

    /// Remove all entries
    pub async fn clear(&self) -> Vec<InvalidationEvent> {
        let mut store = self.store.write().await;

        let keys: Vec<CacheKey> = store.insertion_order.drain(..).collect();
        store.entries.clear();
        store.current_size_bytes = 0;
        let count = keys.len() as u64;
        self.count(&mut store, |s| s.invalidations += count);
        store.refresh_gauges();

        info!("Cleared {} entries from cache", keys.len());
        if keys.is_empty() {
            Vec::new()
        } else {
            vec![InvalidationEvent::new(
                InvalidationReason::Cleared,
                keys,
                self.clock.now(),
            )]
        }
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        store.stats.clone()
    }

    /// Get current cache size in bytes
    pub async fn size_bytes(&self) -> usize {
        let store = self.store.read().await;
        store.current_size_bytes
    }

    /// Get number of entries in cache, stale ones included until removed
    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.entries.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        let store = self.store.read().await;
        store.entries.is_empty()
    }

    /// Keys in insertion order, oldest first
    pub async fn keys(&self) -> Vec<CacheKey> {
        let store = self.store.read().await;
        store.insertion_order.iter().cloned().collect()
    }

    /// Start the periodic sweep on the current tokio runtime
    ///
    /// The task holds a weak reference and stops once the cache is dropped,
    /// when [`SweeperHandle::shutdown`] is awaited, or when the handle is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let interval = self.config.sweep_interval;
        let cache = Arc::downgrade(self);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!("Starting cache sweep task (interval: {:?})", interval);
        let task = tokio::spawn(run_sweeper(cache, interval, shutdown_rx));

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Start the sweep task if `enable_auto_sweep` is set
    pub fn start_auto_sweep(self: &Arc<Self>) -> Option<SweeperHandle> {
        if self.config.enable_auto_sweep {
            Some(self.spawn_sweeper())
        } else {
            debug!("Automatic sweep disabled; stale entries are removed on read");
            None
        }
    }

    fn count(&self, store: &mut CacheStore, update: impl FnOnce(&mut CacheStats)) {
        if self.config.enable_metrics {
            update(&mut store.stats);
        }
    }
}

async fn run_sweeper(
    cache: Weak<AssetCache>,
    interval: std::time::Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let Some(cache) = cache.upgrade() else { break };
                let events = cache.sweep().await;
                if !events.is_empty() {
                    debug!("Periodic sweep: {} events", events.len());
                }
            }
        }
    }

    debug!("Cache sweep task stopped");
}

/// Owner of a running sweep task
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the task and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
