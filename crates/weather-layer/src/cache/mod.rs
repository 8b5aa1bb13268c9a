// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fingerprint and TTL cache store.
//!
//! Each cache namespace is one [`TtlCache`] instance shared behind an `Arc`.
//! Entries expire purely by age: a `get` on a stale entry evicts it, and a
//! background sweeper (see [`spawn_sweeper`]) bounds memory independent of
//! access patterns.

mod key;

pub use key::{conditions_fingerprint, CoordinateKey, GeoPoint};

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// TTL of the weather payload namespace.
pub const WEATHER_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL of the summary text namespace.
pub const SUMMARY_TTL: Duration = Duration::from_secs(10 * 60);

/// Default interval between background sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// A cached value with its creation time.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub created_at: Instant,
}

impl<T> CacheEntry<T> {
    /// An entry is valid while its age is strictly below the TTL.
    pub fn is_valid(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < ttl
    }
}

/// One cache namespace with a fixed TTL.
///
/// Concurrent `get`/`put` on the same key are safe; the last `put` wins.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a valid entry. A stale entry is removed and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if entry.is_valid(self.ttl, now) => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value stamped with the current time.
    pub fn put(&self, key: K, value: V) {
        let entry = CacheEntry {
            payload: value,
            created_at: Instant::now(),
        };
        self.lock().insert(key, entry);
    }

    /// Evict every entry older than the TTL, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid(self.ttl, now));
        before - entries.len()
    }

    /// Number of stored entries, including ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Spawn a task that sweeps `cache` every `interval` until `cancel` fires.
pub fn spawn_sweeper<K, V>(
    name: &'static str,
    cache: Arc<TtlCache<K, V>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Stopping {name} cache sweeper");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = cache.sweep();
                    if evicted > 0 {
                        debug!("Swept {evicted} expired entries from {name} cache");
                    }
                }
            }
        }
    })
}
