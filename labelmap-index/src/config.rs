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

//! Construction-time configuration for [`ShardedLabelLookup`](crate::ShardedLabelLookup)

use serde::{Deserialize, Serialize};

use crate::error::{LabelMapError, Result};

/// Default number of shards (lock stripes)
pub const DEFAULT_SHARD_COUNT: usize = 128;

/// Lookup configuration
///
/// Everything here is fixed for the lifetime of the lookup. There is no
/// resharding: changing `shard_count` or `hash_seed` means building a new
/// lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Number of independently locked shards (typical: 128)
    pub shard_count: usize,
    /// Seed for the routing hash. Two lookups with the same shard count and
    /// seed route every label to the same shard.
    pub hash_seed: u64,
    /// Expected total number of labels, spread evenly over the shards up front
    /// (0 = grow on demand)
    pub initial_capacity: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            hash_seed: 0,
            initial_capacity: 0,
        }
    }
}

impl LookupConfig {
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    pub fn with_hash_seed(mut self, hash_seed: u64) -> Self {
        self.hash_seed = hash_seed;
        self
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Check the configuration before any shard is allocated
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(LabelMapError::InvalidConfig(
                "shard_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Slots to preallocate in each shard
    pub(crate) fn per_shard_capacity(&self) -> usize {
        if self.initial_capacity == 0 {
            0
        } else {
            self.initial_capacity / self.shard_count + 1
        }
    }
}
