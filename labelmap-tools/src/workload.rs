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

//! Multi-threaded workloads against [`ShardedLabelLookup`]
//!
//! The stress workload runs in phases, each fanned out over all threads:
//! insert, verify, erase a slice, verify again. Thread `t` owns labels
//! `t * labels_per_thread .. (t + 1) * labels_per_thread`, and each label maps
//! to its own value truncated to an [`InternalId`].

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use labelmap_index::{InternalId, LookupConfig, LookupStats, Profiler, Result, ShardedLabelLookup};
use tracing::{debug, info};

/// Stress workload parameters
#[derive(Debug, Clone)]
pub struct StressConfig {
    pub threads: usize,
    pub labels_per_thread: u64,
    pub lookup: LookupConfig,
    /// Erase every `erase_every`-th label after the first verification (0 = erase nothing)
    pub erase_every: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 16,
            labels_per_thread: 10_000,
            lookup: LookupConfig::default(),
            erase_every: 0,
        }
    }
}

/// Outcome of a stress run
#[derive(Debug, Clone)]
pub struct StressReport {
    pub inserted: u64,
    pub erased: u64,
    /// Labels `find` could not resolve although they should be present
    pub missing: u64,
    /// Labels resolved to an id other than the last one written
    pub wrong_id: u64,
    /// Erased labels that `find` still resolved
    pub resurrected: u64,
    pub final_entries: usize,
    pub insert_elapsed: Duration,
    pub verify_elapsed: Duration,
    pub stats: LookupStats,
}

impl StressReport {
    pub fn is_consistent(&self) -> bool {
        self.missing == 0
            && self.wrong_id == 0
            && self.resurrected == 0
            && self.final_entries as u64 == self.inserted - self.erased
    }

    /// Inserts per second across all threads
    pub fn insert_throughput(&self) -> f64 {
        let secs = self.insert_elapsed.as_secs_f64();
        if secs == 0.0 { 0.0 } else { self.inserted as f64 / secs }
    }
}

#[inline]
fn id_for(label: u64) -> InternalId {
    label as InternalId
}

#[derive(Default)]
struct VerifyCounts {
    missing: u64,
    wrong_id: u64,
    resurrected: u64,
}

/// Run `f(thread_index)` on `threads` scoped threads and collect the results
fn fan_out<T, F>(threads: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(u64) -> T + Sync,
{
    thread::scope(|scope| {
        let handles: Vec<_> = (0..threads as u64)
            .map(|t| {
                let f = &f;
                scope.spawn(move || f(t))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}

/// Run the insert / verify / erase / verify stress workload
pub fn run_stress(config: &StressConfig, profiler: Option<Arc<Profiler>>) -> Result<StressReport> {
    let mut lookup = ShardedLabelLookup::<u64>::from_config(&config.lookup)?;
    if let Some(profiler) = profiler {
        lookup = lookup.with_profiler(profiler);
    }
    let per_thread = config.labels_per_thread;
    let erase_every = config.erase_every;
    let should_erase = |label: u64| erase_every > 0 && label % erase_every == 0;

    info!(
        threads = config.threads,
        labels_per_thread = per_thread,
        shard_count = config.lookup.shard_count,
        "Starting stress workload"
    );

    let start = Instant::now();
    fan_out(config.threads, |t| {
        for i in 0..per_thread {
            let label = t * per_thread + i;
            lookup.insert(label, id_for(label));
        }
    });
    let insert_elapsed = start.elapsed();
    debug!(elapsed_ms = insert_elapsed.as_millis() as u64, "Insert phase done");

    let start = Instant::now();
    let first_pass = fan_out(config.threads, |t| {
        let mut counts = VerifyCounts::default();
        for i in 0..per_thread {
            let label = t * per_thread + i;
            match lookup.find(&label) {
                None => counts.missing += 1,
                Some(id) if id != id_for(label) => counts.wrong_id += 1,
                Some(_) => {}
            }
        }
        counts
    });
    let verify_elapsed = start.elapsed();

    let erased: u64 = fan_out(config.threads, |t| {
        (0..per_thread)
            .map(|i| t * per_thread + i)
            .filter(|&label| should_erase(label) && lookup.erase(&label))
            .count() as u64
    })
    .into_iter()
    .sum();

    let second_pass = fan_out(config.threads, |t| {
        let mut counts = VerifyCounts::default();
        for i in 0..per_thread {
            let label = t * per_thread + i;
            match (should_erase(label), lookup.find(&label)) {
                (true, Some(_)) => counts.resurrected += 1,
                (false, None) => counts.missing += 1,
                (false, Some(id)) if id != id_for(label) => counts.wrong_id += 1,
                _ => {}
            }
        }
        counts
    });

    let mut totals = VerifyCounts::default();
    for counts in first_pass.iter().chain(second_pass.iter()) {
        totals.missing += counts.missing;
        totals.wrong_id += counts.wrong_id;
        totals.resurrected += counts.resurrected;
    }

    Ok(StressReport {
        inserted: config.threads as u64 * per_thread,
        erased,
        missing: totals.missing,
        wrong_id: totals.wrong_id,
        resurrected: totals.resurrected,
        final_entries: lookup.len(),
        insert_elapsed,
        verify_elapsed,
        stats: lookup.stats(),
    })
}

/// Insert `labels` sequential labels and report how they spread over the shards
pub fn run_distribution(labels: u64, config: &LookupConfig) -> Result<LookupStats> {
    let lookup = ShardedLabelLookup::<u64>::from_config(config)?;
    for label in 0..labels {
        lookup.insert(label, id_for(label));
    }
    Ok(lookup.stats())
}
