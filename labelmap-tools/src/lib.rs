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

//! LabelMap Tools - Command-line workloads for the sharded label lookup
//!
//! This crate provides the `labelmap-bench` CLI, which drives a
//! `ShardedLabelLookup` from many OS threads the way an index engine does
//! during bulk construction, and checks every mapping afterwards.
//!
//! ## Usage
//!
//! ```bash
//! # 16 threads x 10,000 labels, 128 shards, verify and print shard stats
//! labelmap-bench stress
//!
//! # Erase every 4th label after verification, profile every call
//! labelmap-bench stress --erase-every 4 --profile-csv /tmp/lookup.csv --report
//!
//! # How evenly do sequential labels spread over 64 shards?
//! labelmap-bench distribution --labels 1000000 --shard-count 64
//! ```

pub mod workload;
