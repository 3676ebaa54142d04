// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weak interning table for Invids.
//!
//! [`InvidPool`] is a hash set of weakly held Invids. The pool never keeps an Invid alive on its
//! own: as soon as the last handle outside the pool is dropped the Invid reports its slot as stale
//! through a release queue, and the next pool operation expunges it.
//!
//! Entries become unreachable continuously while query results are discarded, so unlike most hash
//! tables the pool does not only grow (doubling plus one to keep the bucket count odd) but also
//! collapses again once occupancy drops below a quarter of its capacity.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, trace};

use crate::invid::{Invid, InvidAllocator, WeakInvid};

/// Initial bucket count of a default pool, a nice biggish prime.
pub const DEFAULT_INITIAL_CAPACITY: usize = 25301;

/// Load factor used when none is configured.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Sizing parameters of an [`InvidPool`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoolConfig {
    /// Number of buckets the table starts with.
    ///
    /// This is also the floor below which the table is never collapsed.
    pub initial_capacity: usize,

    /// Fraction of the bucket count which may be occupied before the table grows.
    pub load_factor: f32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), PoolConfigError> {
        if self.initial_capacity == 0 {
            return Err(PoolConfigError::InvalidCapacity);
        }

        if self.load_factor.is_nan() || self.load_factor <= 0.0 {
            return Err(PoolConfigError::InvalidLoadFactor(self.load_factor));
        }

        Ok(())
    }
}

/// Error types for `PoolConfig` struct.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PoolConfigError {
    /// Pool needs at least one bucket.
    #[error("illegal initial capacity, pool needs at least one bucket")]
    InvalidCapacity,

    /// Load factor is zero, negative or NaN.
    #[error("illegal load factor: {0}")]
    InvalidLoadFactor(f32),
}

/// Hashes of Invids which were dropped while stored in a pool.
#[derive(Debug, Default)]
pub(crate) struct ReleaseQueue {
    hashes: Mutex<Vec<i32>>,
}

impl ReleaseQueue {
    pub(crate) fn push(&self, hash: i32) {
        self.hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hash);
    }

    fn drain(&self) -> Vec<i32> {
        std::mem::take(&mut *self.hashes.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

struct Slot {
    invid: WeakInvid,

    // Remembered so we can still find the bucket after the Invid is gone.
    hash: i32,
}

struct Table {
    buckets: Vec<Vec<Slot>>,
    size: usize,
    threshold: usize,
    floor: usize,
    load_factor: f32,
}

impl Table {
    fn new(config: PoolConfig) -> Self {
        let mut buckets = Vec::with_capacity(config.initial_capacity);
        buckets.resize_with(config.initial_capacity, Vec::new);

        Self {
            buckets,
            size: 0,
            threshold: threshold(config.initial_capacity, config.load_factor),
            floor: config.initial_capacity,
            load_factor: config.load_factor,
        }
    }

    fn index(&self, hash: i32) -> usize {
        (hash & 0x7FFF_FFFF) as usize % self.buckets.len()
    }

    fn find(&self, invid: &Invid) -> Option<Invid> {
        self.buckets[self.index(invid.hash_code())]
            .iter()
            .filter_map(|slot| slot.invid.upgrade())
            .find(|stored| stored == invid)
    }

    fn insert(&mut self, invid: &Invid) {
        let index = self.index(invid.hash_code());
        self.buckets[index].push(Slot {
            invid: invid.downgrade(),
            hash: invid.hash_code(),
        });

        self.size += 1;
        if self.size >= self.threshold {
            self.resize(self.buckets.len() * 2 + 1);
        }
    }

    fn expunge(&mut self, released: Vec<i32>) {
        if released.is_empty() {
            return;
        }

        let mut removed = 0;
        for hash in released {
            let index = self.index(hash);
            let bucket = &mut self.buckets[index];
            let before = bucket.len();
            bucket.retain(|slot| slot.invid.is_live());
            removed += before - bucket.len();
        }
        self.size -= removed;

        trace!(removed, size = self.size, "expunged stale invid slots");

        // Collapse the table if we've drastically shrunk.
        if self.floor < self.size && self.size < self.buckets.len() / 4 {
            self.resize(self.size * 2 + 1);
        }
    }

    fn resize(&mut self, capacity: usize) {
        debug!(
            from = self.buckets.len(),
            to = capacity,
            size = self.size,
            "resizing invid pool"
        );

        let mut buckets: Vec<Vec<Slot>> = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, Vec::new);

        for slot in self.buckets.drain(..).flatten() {
            let index = (slot.hash & 0x7FFF_FFFF) as usize % capacity;
            buckets[index].push(slot);
        }

        self.buckets = buckets;
        self.threshold = threshold(capacity, self.load_factor);
    }
}

fn threshold(capacity: usize, load_factor: f32) -> usize {
    (capacity as f32 * load_factor) as usize
}

/// Thread-safe weak interning pool for Invids.
///
/// Register it process-wide with [`Invid::set_allocator`] or hand it to an
/// [`InvidFactory`](crate::InvidFactory).
pub struct InvidPool {
    table: Mutex<Table>,
    queue: Arc<ReleaseQueue>,
}

impl InvidPool {
    /// Pool with the default capacity and load factor.
    pub fn new() -> Self {
        Self::from_valid_config(PoolConfig::default())
    }

    /// Pool with the given initial capacity and the default load factor.
    ///
    /// A capacity of zero is raised to a single bucket.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self::from_valid_config(PoolConfig {
            initial_capacity: initial_capacity.max(1),
            load_factor: DEFAULT_LOAD_FACTOR,
        })
    }

    /// Pool with a custom configuration.
    pub fn with_config(config: PoolConfig) -> Result<Self, PoolConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: PoolConfig) -> Self {
        Self {
            table: Mutex::new(Table::new(config)),
            queue: Arc::new(ReleaseQueue::default()),
        }
    }

    /// Number of live Invids held by the pool.
    pub fn size(&self) -> usize {
        let mut table = self.lock();
        if table.size == 0 {
            return 0;
        }
        table.expunge(self.queue.drain());
        table.size
    }

    /// Current number of buckets.
    pub fn capacity(&self) -> usize {
        self.lock().buckets.len()
    }

    /// Number of entries which trigger the next growth.
    pub fn threshold(&self) -> usize {
        self.lock().threshold
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InvidPool {
    fn default() -> Self {
        Self::new()
    }
}

impl InvidAllocator for InvidPool {
    fn find_invid(&self, invid: &Invid) -> Option<Invid> {
        let mut table = self.lock();
        table.expunge(self.queue.drain());
        table.find(invid)
    }

    fn store_invid(&self, invid: &Invid) {
        let mut table = self.lock();
        table.expunge(self.queue.drain());

        if table.find(invid).is_some() {
            return;
        }

        invid.attach_release(&self.queue);
        table.insert(invid);
    }

    fn intern(&self, invid: &Invid) -> Invid {
        // Lookup and insertion happen under one lock so concurrent callers agree on a single
        // canonical instance.
        let mut table = self.lock();
        table.expunge(self.queue.drain());

        if let Some(found) = table.find(invid) {
            return found;
        }

        invid.attach_release(&self.queue);
        table.insert(invid);
        invid.clone()
    }
}

impl std::fmt::Debug for InvidPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.lock();
        f.debug_struct("InvidPool")
            .field("size", &table.size)
            .field("capacity", &table.buckets.len())
            .field("threshold", &table.threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use crate::invid::{Invid, InvidAllocator, InvidFactory};
    use crate::test_utils::setup_logging;

    use super::{InvidPool, PoolConfig, PoolConfigError};

    fn small_pool() -> Arc<InvidPool> {
        Arc::new(
            InvidPool::with_config(PoolConfig {
                initial_capacity: 3,
                load_factor: 0.75,
            })
            .unwrap(),
        )
    }

    #[test]
    fn config_validation() {
        assert!(PoolConfig::default().validate().is_ok());
        assert_matches!(
            InvidPool::with_config(PoolConfig {
                initial_capacity: 0,
                load_factor: 0.75
            }),
            Err(PoolConfigError::InvalidCapacity)
        );
        assert_matches!(
            PoolConfig {
                initial_capacity: 10,
                load_factor: 0.0
            }
            .validate(),
            Err(PoolConfigError::InvalidLoadFactor(_))
        );
        assert_matches!(
            PoolConfig {
                initial_capacity: 10,
                load_factor: f32::NAN
            }
            .validate(),
            Err(PoolConfigError::InvalidLoadFactor(_))
        );
    }

    #[test]
    fn find_and_store() {
        let pool = InvidPool::with_capacity(11);
        let plain = InvidFactory::new();

        let invid = plain.create(4, 40);
        assert!(pool.find_invid(&invid).is_none());

        pool.store_invid(&invid);
        let found = pool.find_invid(&plain.create(4, 40)).unwrap();
        assert!(found.ptr_eq(&invid));

        // Storing an equal Invid again is a no-op.
        pool.store_invid(&plain.create(4, 40));
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn grows_past_threshold() {
        setup_logging();

        let pool = small_pool();
        let factory = InvidFactory::with_allocator(pool.clone());
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.threshold(), 2);

        let held: Vec<Invid> = (0..40).map(|num| factory.create(1, num)).collect();

        // 3 -> 7 -> 15 -> 31 -> 63
        assert_eq!(pool.capacity(), 63);
        assert_eq!(pool.size(), 40);

        // Everything is still reachable after rehashing.
        for invid in &held {
            assert!(factory.create(1, invid.num()).ptr_eq(invid));
        }
        assert_eq!(pool.size(), 40);
    }

    #[test]
    fn shrinks_after_release() {
        let pool = small_pool();
        let factory = InvidFactory::with_allocator(pool.clone());

        let mut held: Vec<Invid> = (0..40).map(|num| factory.create(2, num)).collect();
        assert_eq!(pool.capacity(), 63);

        held.truncate(10);

        // 10 live entries is below a quarter of 63 buckets, table collapses to 2 * 10 + 1.
        assert_eq!(pool.size(), 10);
        assert_eq!(pool.capacity(), 21);

        for invid in &held {
            assert!(factory.create(2, invid.num()).ptr_eq(invid));
        }
    }

    #[test]
    fn expunges_unreachable_invids() {
        let pool = small_pool();
        let factory = InvidFactory::with_allocator(pool.clone());

        let held: Vec<Invid> = (0..25).map(|num| factory.create(9, num)).collect();
        assert_eq!(pool.size(), 25);

        drop(held);
        assert_eq!(pool.size(), 0);

        // A fresh Invid takes the place of a released one.
        let again = factory.create(9, 3);
        assert!(again.is_interned());
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn released_slot_does_not_evict_replacement() {
        let pool = small_pool();
        let plain = InvidFactory::new();

        let first = plain.create(5, 5);
        pool.store_invid(&first);
        drop(first);

        // The stale slot is expunged before the replacement goes in.
        let second = plain.create(5, 5);
        pool.store_invid(&second);
        assert_eq!(pool.size(), 1);
        assert!(pool.find_invid(&plain.create(5, 5)).unwrap().ptr_eq(&second));
    }

    #[test]
    fn every_pool_expunges_shared_invid() {
        let first_pool = small_pool();
        let second_pool = small_pool();
        let plain = InvidFactory::new();

        let invid = plain.create(6, 60);
        first_pool.store_invid(&invid);
        second_pool.store_invid(&invid);
        // Storing again must not register a second release hook.
        second_pool.store_invid(&invid);
        assert_eq!(first_pool.size(), 1);
        assert_eq!(second_pool.size(), 1);

        drop(invid);
        assert_eq!(first_pool.size(), 0);
        assert_eq!(second_pool.size(), 0);
        assert!(second_pool.find_invid(&plain.create(6, 60)).is_none());
    }

    #[test]
    fn dropped_pool_does_not_block_release() {
        let plain = InvidFactory::new();
        let invid = plain.create(7, 70);

        let gone = small_pool();
        gone.store_invid(&invid);
        drop(gone);

        let pool = small_pool();
        pool.store_invid(&invid);
        drop(invid);
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn concurrent_interning() {
        let pool = Arc::new(InvidPool::with_capacity(7));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let factory = InvidFactory::with_allocator(pool.clone());
                std::thread::spawn(move || {
                    (0..100)
                        .map(|num| factory.create(3, num))
                        .collect::<Vec<Invid>>()
                })
            })
            .collect();

        let results: Vec<Vec<Invid>> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        for num in 0..100 {
            let first = &results[0][num];
            for result in &results[1..] {
                assert!(result[num].ptr_eq(first));
            }
        }
        assert_eq!(pool.size(), 100);
    }
}
