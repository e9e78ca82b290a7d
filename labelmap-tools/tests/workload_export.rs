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

use std::sync::Arc;

use labelmap_index::{LookupConfig, Profiler, profiling::CSV_HEADER};
use labelmap_tools::workload::{StressConfig, run_stress};

#[test]
fn test_profiled_stress_exports_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stress.csv");

    let profiler = Arc::new(Profiler::new());
    let config = StressConfig {
        threads: 4,
        labels_per_thread: 250,
        lookup: LookupConfig::default().with_shard_count(32),
        erase_every: 5,
    };
    let report = run_stress(&config, Some(Arc::clone(&profiler))).unwrap();
    assert!(report.is_consistent(), "{:?}", report);
    assert_eq!(report.erased, 200);

    profiler.export_csv(&path).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER));

    let rows: Vec<&str> = lines.collect();
    let calls_for = |tag: &str| -> u64 {
        rows.iter()
            .filter(|row| row.starts_with(&format!("\"{}\",", tag)))
            .map(|row| row.split(',').nth(2).unwrap().parse::<u64>().unwrap())
            .sum()
    };
    assert_eq!(calls_for("label_lookup.insert"), 1_000);
    // Two verification passes over every label
    assert_eq!(calls_for("label_lookup.find"), 2_000);
    // Erase is only attempted on every 5th label
    assert_eq!(calls_for("label_lookup.erase"), 200);
}
