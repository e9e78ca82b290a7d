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

//! LabelMap Index Layer
//!
//! Label resolution for graph-based vector indices.
//!
//! - **Sharded label lookup** (`label_lookup`): external label -> dense
//!   internal id, striped over independently locked shards so insert, search
//!   and delete threads only contend when their labels share a shard.
//! - **Profiling** (`profiling`): injectable scoped timers with per-thread
//!   aggregation and CSV/JSON export.
//!
//! ## Example
//!
//! ```rust
//! use labelmap_index::ShardedLabelLookup;
//!
//! let lookup: ShardedLabelLookup<u64> = ShardedLabelLookup::new();
//! lookup.insert(42, 7);
//! assert_eq!(lookup.find(&42), Some(7));
//! assert!(lookup.erase(&42));
//! assert_eq!(lookup.find(&42), None);
//! ```

pub mod config;
pub mod error;
pub mod label_lookup;
pub mod profiling;

pub use config::{DEFAULT_SHARD_COUNT, LookupConfig};
pub use error::{LabelMapError, Result};
pub use label_lookup::{InternalId, Label, LookupStats, ShardedLabelLookup};
pub use profiling::{Profiler, ScopedTimer, TagThreadStats, ThreadSpan};
