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

//! Light Per-Thread Profiling
//!
//! A [`Profiler`] is an explicitly constructed instrumentation context. It is
//! shared by `Arc` with whatever it should observe (for example
//! [`ShardedLabelLookup::with_profiler`](crate::ShardedLabelLookup::with_profiler))
//! and exported on demand.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use labelmap_index::profiling::Profiler;
//!
//! let profiler = Arc::new(Profiler::new());
//!
//! {
//!     let _t = profiler.timer("graph.insert");
//!     // ... timed work ...
//! }
//!
//! profiler.report(&mut std::io::stderr())?;
//! profiler.export_csv("/tmp/labelmap_profile.csv")?;
//! profiler.clear();
//! ```
//!
//! ## Recording Path
//!
//! Each thread appends events to its own buffer inside the profiler, so
//! recording never contends on a shared lock. [`Profiler::flush`] moves every
//! thread's buffered events into shared storage; all reporting entry points
//! flush first.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use thread_local::ThreadLocal;
use tracing::info;

use crate::error::Result;

/// CSV header written by [`Profiler::export_csv`]
pub const CSV_HEADER: &str = "Tag,ThreadID,Calls,TotalTime_ms,AverageTime_us,MinTime_us,MaxTime_us";

// ============================================================================
// Events
// ============================================================================

/// One timed section
#[derive(Debug, Clone)]
pub(crate) struct Event {
    tag: String,
    thread: ThreadId,
    duration: Duration,
}

/// Per-thread recording state
///
/// `ThreadLocal` hands an exited thread's slot to the next new thread, so one
/// buffer can hold spans of several threads, one after another.
#[derive(Debug, Default)]
struct LocalBuffer {
    events: Vec<Event>,
    spans: Vec<RawSpan>,
}

/// Offsets from the profiler origin
#[derive(Debug, Clone, Copy)]
struct RawSpan {
    thread: ThreadId,
    first_start: Duration,
    last_end: Duration,
}

/// Wall-clock window in which a thread recorded events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSpan {
    pub thread: String,
    pub first_start_us: u64,
    pub last_end_us: u64,
}

// ============================================================================
// Aggregation
// ============================================================================

/// Statistics for one operation type
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OpStats {
    pub count: u64,
    pub total_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
}

impl OpStats {
    pub fn record(&mut self, elapsed_ns: u64) {
        if self.count == 0 || elapsed_ns < self.min_ns {
            self.min_ns = elapsed_ns;
        }
        if elapsed_ns > self.max_ns {
            self.max_ns = elapsed_ns;
        }
        self.count += 1;
        self.total_ns = self.total_ns.saturating_add(elapsed_ns);
    }

    pub fn mean_ns(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.count as f64
        }
    }
}

/// Aggregated timings of one tag on one thread
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagThreadStats {
    pub tag: String,
    pub thread: String,
    pub calls: u64,
    pub total_ms: f64,
    pub mean_us: f64,
    pub min_us: f64,
    pub max_us: f64,
}

impl TagThreadStats {
    fn from_op_stats(tag: &str, thread: &str, stats: &OpStats) -> Self {
        Self {
            tag: tag.to_string(),
            thread: thread.to_string(),
            calls: stats.count,
            total_ms: stats.total_ns as f64 / 1_000_000.0,
            mean_us: stats.mean_ns() / 1_000.0,
            min_us: stats.min_ns as f64 / 1_000.0,
            max_us: stats.max_ns as f64 / 1_000.0,
        }
    }
}

#[derive(Serialize)]
struct ProfileDump<'a> {
    total_elapsed_ms: f64,
    operations: &'a [TagThreadStats],
    threads: &'a [ThreadSpan],
}

/// Render a thread id as the bare number inside `ThreadId(..)`
pub fn thread_label(id: ThreadId) -> String {
    let raw = format!("{:?}", id);
    raw.strip_prefix("ThreadId(")
        .and_then(|s| s.strip_suffix(')'))
        .map(str::to_string)
        .unwrap_or(raw)
}

/// Numeric order for numeric thread labels ("2" before "10"), text order otherwise
fn thread_label_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

// ============================================================================
// Profiler
// ============================================================================

/// Injectable timing collector
pub struct Profiler {
    enabled: AtomicBool,
    origin: Instant,
    local: ThreadLocal<Mutex<LocalBuffer>>,
    flushed: Mutex<Vec<Event>>,
}

impl Profiler {
    /// Create an enabled profiler
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            origin: Instant::now(),
            local: ThreadLocal::new(),
            flushed: Mutex::new(Vec::new()),
        }
    }

    /// Create a profiler that records nothing until enabled
    pub fn disabled() -> Self {
        let profiler = Self::new();
        profiler.set_enabled(false);
        profiler
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Time since the profiler was created
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    /// Start a timer that records against `tag` when dropped or stopped
    #[inline]
    pub fn timer(&self, tag: impl Into<String>) -> ScopedTimer<'_> {
        let tag = if self.is_enabled() { Some(tag.into()) } else { None };
        ScopedTimer {
            profiler: self,
            tag,
            start: Instant::now(),
        }
    }

    /// Run `f` under a timer tagged `tag`
    #[inline]
    pub fn scope<T>(&self, tag: &str, f: impl FnOnce() -> T) -> T {
        if !self.is_enabled() {
            return f();
        }
        let _timer = self.timer(tag);
        f()
    }

    /// Record a duration measured elsewhere, ending now
    pub fn record(&self, tag: impl Into<String>, duration: Duration) {
        if !self.is_enabled() {
            return;
        }
        let end = Instant::now();
        let start = end.checked_sub(duration).unwrap_or(self.origin);
        self.record_span(tag.into(), start, end);
    }

    fn record_span(&self, tag: String, start: Instant, end: Instant) {
        let thread = std::thread::current().id();
        let start_offset = start.saturating_duration_since(self.origin);
        let end_offset = end.saturating_duration_since(self.origin);

        let mut buffer = self.local.get_or(|| Mutex::new(LocalBuffer::default())).lock();
        buffer.events.push(Event {
            tag,
            thread,
            duration: end.saturating_duration_since(start),
        });
        match buffer.spans.last_mut() {
            Some(span) if span.thread == thread => span.last_end = end_offset,
            _ => buffer.spans.push(RawSpan {
                thread,
                first_start: start_offset,
                last_end: end_offset,
            }),
        }
    }

    /// Move every thread's buffered events into shared storage
    pub fn flush(&self) {
        let mut flushed = self.flushed.lock();
        for buffer in self.local.iter() {
            flushed.append(&mut buffer.lock().events);
        }
    }

    /// Number of recorded events, buffered or flushed
    pub fn event_count(&self) -> usize {
        let buffered: usize = self.local.iter().map(|b| b.lock().events.len()).sum();
        buffered + self.flushed.lock().len()
    }

    /// Aggregate all events by tag and thread, sorted by tag then thread
    pub fn summary(&self) -> Vec<TagThreadStats> {
        self.flush();
        let flushed = self.flushed.lock();

        let mut grouped: BTreeMap<&str, HashMap<ThreadId, OpStats>> = BTreeMap::new();
        for event in flushed.iter() {
            grouped
                .entry(event.tag.as_str())
                .or_default()
                .entry(event.thread)
                .or_default()
                .record(event.duration.as_nanos() as u64);
        }

        let mut rows = Vec::new();
        for (tag, threads) in grouped {
            let mut per_thread: Vec<(String, OpStats)> = threads
                .into_iter()
                .map(|(id, stats)| (thread_label(id), stats))
                .collect();
            per_thread.sort_by(|a, b| thread_label_order(&a.0, &b.0));
            for (thread, stats) in per_thread {
                rows.push(TagThreadStats::from_op_stats(tag, &thread, &stats));
            }
        }
        rows
    }

    /// First start / last end of every thread that recorded an event
    pub fn thread_spans(&self) -> Vec<ThreadSpan> {
        let mut spans: Vec<ThreadSpan> = self
            .local
            .iter()
            .flat_map(|buffer| buffer.lock().spans.clone())
            .map(|span| ThreadSpan {
                thread: thread_label(span.thread),
                first_start_us: span.first_start.as_micros() as u64,
                last_end_us: span.last_end.as_micros() as u64,
            })
            .collect();
        spans.sort_by(|a, b| a.first_start_us.cmp(&b.first_start_us));
        spans
    }

    /// Write a human-readable per-tag, per-thread report
    pub fn report<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let rows = self.summary();

        writeln!(out, "\n=== Fine-Grained Timing (Per Thread) ===")?;
        let mut current_tag: Option<&str> = None;
        let mut threads_seen = std::collections::HashSet::new();
        for row in &rows {
            if current_tag != Some(row.tag.as_str()) {
                writeln!(out, "\n--- {} ---", row.tag)?;
                current_tag = Some(row.tag.as_str());
            }
            threads_seen.insert(row.thread.as_str());
            writeln!(
                out,
                "  Thread {} | calls: {} | total(ms): {:.3} | avg(us): {:.3} | min(us): {:.3} | max(us): {:.3}",
                row.thread, row.calls, row.total_ms, row.mean_us, row.min_us, row.max_us
            )?;
        }
        writeln!(out, "\nTotal threads used: {}", threads_seen.len())?;
        Ok(())
    }

    /// Export the per-tag, per-thread aggregation as CSV
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let rows = self.summary();

        let mut file = BufWriter::new(File::create(path)?);
        writeln!(file, "{}", CSV_HEADER)?;
        for row in &rows {
            writeln!(
                file,
                "\"{}\",{},{},{:.3},{:.3},{:.3},{:.3}",
                row.tag.replace('"', "\"\""),
                row.thread,
                row.calls,
                row.total_ms,
                row.mean_us,
                row.min_us,
                row.max_us
            )?;
        }
        file.flush()?;

        info!(path = %path.display(), rows = rows.len(), "Profiler data exported to CSV");
        Ok(())
    }

    /// Export the aggregation and thread spans as JSON
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let rows = self.summary();
        let threads = self.thread_spans();
        let dump = ProfileDump {
            total_elapsed_ms: self.elapsed().as_secs_f64() * 1000.0,
            operations: &rows,
            threads: &threads,
        };

        let mut file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut file, &dump)?;
        file.flush()?;

        info!(path = %path.display(), rows = rows.len(), "Profiler data exported to JSON");
        Ok(())
    }

    /// Drop all recorded events and thread spans
    pub fn clear(&self) {
        self.flushed.lock().clear();
        for buffer in self.local.iter() {
            *buffer.lock() = LocalBuffer::default();
        }
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Profiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profiler")
            .field("enabled", &self.is_enabled())
            .field("events", &self.event_count())
            .finish()
    }
}

/// Timer bound to a [`Profiler`]; records once, on `stop` or drop
#[must_use = "a timer records when it is dropped; binding it to `_` drops it immediately"]
pub struct ScopedTimer<'a> {
    profiler: &'a Profiler,
    /// `None` once recorded, or when the profiler was disabled at start
    tag: Option<String>,
    start: Instant,
}

impl ScopedTimer<'_> {
    /// Stop the timer and return the elapsed time
    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    fn finish(&mut self) -> Duration {
        let end = Instant::now();
        if let Some(tag) = self.tag.take() {
            self.profiler.record_span(tag, self.start, end);
        }
        end.saturating_duration_since(self.start)
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Tests
// ============================================================================
