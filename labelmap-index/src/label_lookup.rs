// SPDX-License-Identifier: AGPL-3.0-or-later
// LabelMap - Sharded label lookup for concurrent vector indices
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Lock-Striped Label Lookup
//!
//! Maps external labels to the dense internal ids a vector index uses to
//! address its node storage. Insert, search and delete paths all resolve
//! labels here, from many threads at once.
//!
//! ## Design
//!
//! ```text
//! label ──xxh64(seed)──► hash % shard_count ──► shard i
//!                                               ┌──────────────────────────┐
//!                                               │ RwLock<HashMap<L, u32>>  │
//!                                               └──────────────────────────┘
//! ```
//!
//! - A fixed number of shards (default 128), each a `HashMap` behind its own
//!   `parking_lot::RwLock`. Shards are cache-line aligned.
//! - Routing is a pure function of the label, the seed and the shard count, so
//!   a label lives in the same shard for the lifetime of the lookup.
//! - Every operation takes exactly one shard lock and never holds two at once.
//!   Threads on different shards never wait for each other; readers on the
//!   same shard share the lock.
//!
//! ## Concurrent Insert/Erase
//!
//! Racing `insert` and `erase` of the same label resolve in lock order: the
//! later exclusive holder wins. Nothing stronger is promised.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;
use twox_hash::XxHash64;

use crate::config::LookupConfig;
use crate::error::Result;
use crate::profiling::Profiler;

/// Dense id assigned by the index engine
pub type InternalId = u32;

/// Default label type used by the index engine
pub type Label = u64;

const TAG_INSERT: &str = "label_lookup.insert";
const TAG_FIND: &str = "label_lookup.find";
const TAG_ERASE: &str = "label_lookup.erase";

/// One lock stripe
#[repr(align(64))]
struct Shard<L> {
    map: RwLock<HashMap<L, InternalId>>,
}

impl<L> Shard<L> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            map: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }
}

/// Load distribution across shards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupStats {
    pub entries: usize,
    pub shard_count: usize,
    pub min_shard_len: usize,
    pub max_shard_len: usize,
    pub empty_shards: usize,
    /// Largest shard over the mean shard size (1.0 = perfectly balanced)
    pub imbalance: f64,
}

impl LookupStats {
    fn from_shard_lens(lens: &[usize]) -> Self {
        let entries: usize = lens.iter().sum();
        let max_shard_len = lens.iter().copied().max().unwrap_or(0);
        let mean = entries as f64 / lens.len().max(1) as f64;
        Self {
            entries,
            shard_count: lens.len(),
            min_shard_len: lens.iter().copied().min().unwrap_or(0),
            max_shard_len,
            empty_shards: lens.iter().filter(|&&n| n == 0).count(),
            imbalance: if entries == 0 { 1.0 } else { max_shard_len as f64 / mean },
        }
    }
}

/// Thread-safe label -> internal id map, striped over independently locked shards
pub struct ShardedLabelLookup<L = Label> {
    shards: Box<[Shard<L>]>,
    hash_seed: u64,
    profiler: Option<Arc<Profiler>>,
}

impl<L: Hash + Eq> ShardedLabelLookup<L> {
    /// Create a lookup with the default 128 shards
    pub fn new() -> Self {
        Self::build(&LookupConfig::default())
    }

    /// Create a lookup with `shard_count` shards
    pub fn with_shard_count(shard_count: usize) -> Result<Self> {
        Self::from_config(&LookupConfig::default().with_shard_count(shard_count))
    }

    /// Create a lookup from a validated configuration
    pub fn from_config(config: &LookupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &LookupConfig) -> Self {
        let per_shard = config.per_shard_capacity();
        let shards: Box<[Shard<L>]> = (0..config.shard_count)
            .map(|_| Shard::with_capacity(per_shard))
            .collect();

        debug!(
            shard_count = config.shard_count,
            hash_seed = config.hash_seed,
            per_shard_capacity = per_shard,
            "Created sharded label lookup"
        );

        Self {
            shards,
            hash_seed: config.hash_seed,
            profiler: None,
        }
    }

    /// Report insert/find/erase timings to `profiler`
    pub fn with_profiler(mut self, profiler: Arc<Profiler>) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn profiler(&self) -> Option<&Arc<Profiler>> {
        self.profiler.as_ref()
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard that owns `label`
    ///
    /// Pure and lock-free; every other operation routes through it.
    #[inline]
    pub fn shard_index<Q>(&self, label: &Q) -> usize
    where
        L: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut hasher = XxHash64::with_seed(self.hash_seed);
        label.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    #[inline]
    fn shard_for<Q>(&self, label: &Q) -> &Shard<L>
    where
        L: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        &self.shards[self.shard_index(label)]
    }

    #[inline]
    fn timed<T>(&self, tag: &str, f: impl FnOnce() -> T) -> T {
        match &self.profiler {
            Some(profiler) => profiler.scope(tag, f),
            None => f(),
        }
    }

    /// Map `label` to `id`, replacing any previous mapping
    pub fn insert(&self, label: L, id: InternalId) {
        self.timed(TAG_INSERT, || {
            let shard = self.shard_for(&label);
            shard.map.write().insert(label, id);
        })
    }

    /// Internal id for `label`, or `None` if it is not mapped
    pub fn find<Q>(&self, label: &Q) -> Option<InternalId>
    where
        L: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.timed(TAG_FIND, || self.shard_for(label).map.read().get(label).copied())
    }

    /// Remove `label`; returns whether a mapping was removed
    pub fn erase<Q>(&self, label: &Q) -> bool
    where
        L: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.timed(TAG_ERASE, || {
            self.shard_for(label).map.write().remove(label).is_some()
        })
    }

    pub fn contains<Q>(&self, label: &Q) -> bool
    where
        L: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard_for(label).map.read().contains_key(label)
    }

    /// Number of entries in shard `index`
    pub fn shard_len(&self, index: usize) -> Option<usize> {
        self.shards.get(index).map(|shard| shard.map.read().len())
    }

    /// Entry count of every shard, in shard order
    ///
    /// Shards are read one at a time, so under concurrent mutation the result
    /// is not a single point-in-time snapshot.
    pub fn shard_lens(&self) -> Vec<usize> {
        self.shards.iter().map(|shard| shard.map.read().len()).collect()
    }

    /// Total number of mapped labels
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.map.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.map.read().is_empty())
    }

    pub fn stats(&self) -> LookupStats {
        LookupStats::from_shard_lens(&self.shard_lens())
    }

    /// Remove every mapping, one shard at a time
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.map.write().clear();
        }
        debug!(shard_count = self.shards.len(), "Cleared sharded label lookup");
    }
}

impl<L: Hash + Eq + Clone> ShardedLabelLookup<L> {
    /// All mapped labels, scanned shard by shard
    pub fn labels(&self) -> Vec<L> {
        let mut labels = Vec::new();
        for shard in self.shards.iter() {
            labels.extend(shard.map.read().keys().cloned());
        }
        labels
    }

    /// All (label, id) pairs, scanned shard by shard
    pub fn entries(&self) -> Vec<(L, InternalId)> {
        let mut entries = Vec::new();
        for shard in self.shards.iter() {
            entries.extend(shard.map.read().iter().map(|(l, &id)| (l.clone(), id)));
        }
        entries
    }
}

impl<L: Hash + Eq> Default for ShardedLabelLookup<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> fmt::Debug for ShardedLabelLookup<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedLabelLookup")
            .field("shard_count", &self.shards.len())
            .field("hash_seed", &self.hash_seed)
            .field("profiled", &self.profiler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const LOCK_WAIT: Duration = Duration::from_secs(5);

    /// First label after `label` that routes to a different shard
    fn label_in_other_shard(lookup: &ShardedLabelLookup<u64>, label: u64) -> u64 {
        let shard = lookup.shard_index(&label);
        (label + 1..)
            .find(|l| lookup.shard_index(l) != shard)
            .unwrap()
    }

    #[test]
    fn test_write_locked_shard_does_not_block_other_shards() {
        let lookup = Arc::new(ShardedLabelLookup::<u64>::new());
        let a = 1u64;
        let b = label_in_other_shard(&lookup, a);

        let guard = lookup.shards[lookup.shard_index(&a)].map.write();

        let (tx, rx) = mpsc::channel();
        let worker = {
            let lookup = Arc::clone(&lookup);
            thread::spawn(move || {
                lookup.insert(b, 5);
                tx.send(lookup.find(&b)).unwrap();
            })
        };

        assert_eq!(rx.recv_timeout(LOCK_WAIT), Ok(Some(5)));
        drop(guard);
        worker.join().unwrap();
    }

    #[test]
    fn test_read_locked_shard_admits_other_readers() {
        let lookup = Arc::new(ShardedLabelLookup::<u64>::new());
        lookup.insert(7, 70);

        let guard = lookup.shards[lookup.shard_index(&7)].map.read();

        let (tx, rx) = mpsc::channel();
        let reader = {
            let lookup = Arc::clone(&lookup);
            thread::spawn(move || tx.send(lookup.find(&7)).unwrap())
        };

        assert_eq!(rx.recv_timeout(LOCK_WAIT), Ok(Some(70)));
        drop(guard);
        reader.join().unwrap();
    }

    #[test]
    fn test_write_waits_for_same_shard_writer() {
        let lookup = Arc::new(ShardedLabelLookup::<u64>::new());
        let guard = lookup.shards[lookup.shard_index(&3)].map.write();

        let (tx, rx) = mpsc::channel();
        let writer = {
            let lookup = Arc::clone(&lookup);
            thread::spawn(move || {
                lookup.insert(3, 30);
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(guard);
        assert_eq!(rx.recv_timeout(LOCK_WAIT), Ok(()));
        writer.join().unwrap();
        assert_eq!(lookup.find(&3), Some(30));
    }

    #[test]
    fn test_preallocated_lookup_round_trip() {
        let config = LookupConfig::default()
            .with_shard_count(16)
            .with_initial_capacity(10_000);
        let lookup = ShardedLabelLookup::<u64>::from_config(&config).unwrap();
        assert!(lookup.is_empty());
        for shard in lookup.shards.iter() {
            assert!(shard.map.read().capacity() >= config.per_shard_capacity());
        }

        for label in 0..10_000u64 {
            lookup.insert(label, label as InternalId);
        }
        assert_eq!(lookup.len(), 10_000);
        assert_eq!(lookup.find(&9_999), Some(9_999));
        assert!(lookup.erase(&0));
        assert_eq!(lookup.find(&0), None);
    }

    #[test]
    fn test_insert_find_erase_scenario() {
        let lookup: ShardedLabelLookup<String> = ShardedLabelLookup::new();
        assert_eq!(lookup.shard_count(), 128);

        lookup.insert("user_42".to_string(), 7);
        assert_eq!(lookup.find("user_42"), Some(7));

        lookup.insert("user_42".to_string(), 9);
        assert_eq!(lookup.find("user_42"), Some(9));
        assert_eq!(lookup.len(), 1);

        assert!(lookup.erase("user_42"));
        assert_eq!(lookup.find("user_42"), None);
        assert!(!lookup.erase("user_42"));
    }

    #[test]
    fn test_erase_absent_leaves_state() {
        let lookup = ShardedLabelLookup::<u64>::new();
        lookup.insert(1, 10);
        assert!(!lookup.erase(&2));
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.find(&1), Some(10));
    }

    #[test]
    fn test_max_id_is_a_real_id() {
        let lookup = ShardedLabelLookup::<u64>::new();
        lookup.insert(5, InternalId::MAX);
        assert_eq!(lookup.find(&5), Some(InternalId::MAX));
        assert_eq!(lookup.find(&6), None);
    }

    #[test]
    fn test_shard_index_stable_across_instances() {
        let a = ShardedLabelLookup::<u64>::new();
        let b = ShardedLabelLookup::<u64>::new();
        for label in 0..10_000u64 {
            let idx = a.shard_index(&label);
            assert!(idx < 128);
            assert_eq!(idx, a.shard_index(&label));
            assert_eq!(idx, b.shard_index(&label));
        }
    }

    #[test]
    fn test_borrowed_and_owned_route_identically() {
        let lookup: ShardedLabelLookup<String> = ShardedLabelLookup::new();
        let owned = "doc-17".to_string();
        assert_eq!(lookup.shard_index(&owned), lookup.shard_index("doc-17"));
    }

    #[test]
    fn test_entry_lands_in_routed_shard() {
        let lookup = ShardedLabelLookup::<u64>::with_shard_count(8).unwrap();
        lookup.insert(99, 1);
        let idx = lookup.shard_index(&99);
        for i in 0..8 {
            assert_eq!(lookup.shard_len(i), Some(usize::from(i == idx)));
        }
        assert_eq!(lookup.shard_len(8), None);
    }

    #[test]
    fn test_zero_shards_rejected() {
        assert!(ShardedLabelLookup::<u64>::with_shard_count(0).is_err());
    }

    #[test]
    fn test_single_shard_works() {
        let lookup = ShardedLabelLookup::<u64>::with_shard_count(1).unwrap();
        for label in 0..100 {
            assert_eq!(lookup.shard_index(&label), 0);
            lookup.insert(label, label as InternalId);
        }
        assert_eq!(lookup.len(), 100);
        assert_eq!(lookup.shard_lens(), vec![100]);
    }

    #[test]
    fn test_seed_changes_routing() {
        let a = ShardedLabelLookup::<u64>::from_config(&LookupConfig::default()).unwrap();
        let b = ShardedLabelLookup::<u64>::from_config(
            &LookupConfig::default().with_hash_seed(0x5eed),
        )
        .unwrap();
        let differing = (0..1000u64)
            .filter(|l| a.shard_index(l) != b.shard_index(l))
            .count();
        assert!(differing > 500, "only {} labels moved", differing);
    }

    #[test]
    fn test_sequential_labels_spread_over_shards() {
        let lookup = ShardedLabelLookup::<u64>::new();
        for label in 0..128_000u64 {
            lookup.insert(label, 0);
        }
        let stats = lookup.stats();
        assert_eq!(stats.entries, 128_000);
        assert_eq!(stats.empty_shards, 0);
        // ~1000 per shard; a clustering hash would blow far past this
        assert!(stats.imbalance < 1.3, "imbalance {}", stats.imbalance);
    }

    #[test]
    fn test_labels_and_entries_cover_partition() {
        let lookup = ShardedLabelLookup::<u64>::with_shard_count(16).unwrap();
        for label in 0..500u64 {
            lookup.insert(label, (label * 2) as InternalId);
        }
        for label in (0..500u64).step_by(3) {
            lookup.erase(&label);
        }

        let labels: Vec<u64> = lookup.labels();
        let unique: HashSet<u64> = labels.iter().copied().collect();
        assert_eq!(labels.len(), unique.len());

        let expected: HashSet<u64> = (0..500u64).filter(|l| l % 3 != 0).collect();
        assert_eq!(unique, expected);

        for (label, id) in lookup.entries() {
            assert_eq!(id, (label * 2) as InternalId);
        }
    }

    #[test]
    fn test_clear_and_stats() {
        let lookup = ShardedLabelLookup::<u64>::with_shard_count(4).unwrap();
        assert!(lookup.is_empty());
        assert_eq!(lookup.stats().imbalance, 1.0);

        for label in 0..40u64 {
            lookup.insert(label, 1);
        }
        assert!(!lookup.is_empty());
        assert!(lookup.contains(&3));

        lookup.clear();
        assert!(lookup.is_empty());
        assert!(!lookup.contains(&3));
        assert_eq!(lookup.stats().entries, 0);
    }

    #[test]
    fn test_profiler_records_without_changing_results() {
        let profiler = Arc::new(Profiler::new());
        let plain = ShardedLabelLookup::<u64>::new();
        let profiled = ShardedLabelLookup::<u64>::new().with_profiler(Arc::clone(&profiler));

        for lookup in [&plain, &profiled] {
            lookup.insert(1, 11);
            assert_eq!(lookup.find(&1), Some(11));
            assert_eq!(lookup.find(&2), None);
            assert!(lookup.erase(&1));
        }

        let rows = profiler.summary();
        let calls = |tag: &str| {
            rows.iter()
                .filter(|r| r.tag == tag)
                .map(|r| r.calls)
                .sum::<u64>()
        };
        assert_eq!(calls(TAG_INSERT), 1);
        assert_eq!(calls(TAG_FIND), 2);
        assert_eq!(calls(TAG_ERASE), 1);
        assert!(plain.profiler().is_none());
    }
}
