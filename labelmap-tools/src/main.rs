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

//! LabelMap Bench CLI
//!
//! ```bash
//! labelmap-bench stress --threads 16 --labels-per-thread 10000 --shard-count 128
//! labelmap-bench distribution --labels 1000000 --shard-count 128 --seed 7
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use labelmap_index::{DEFAULT_SHARD_COUNT, LookupConfig, LookupStats, Profiler};
use labelmap_tools::workload::{StressConfig, run_distribution, run_stress};

/// LabelMap Bench CLI - Concurrent workloads for the sharded label lookup
#[derive(Parser)]
#[command(name = "labelmap-bench")]
#[command(about = "Concurrent workloads for the LabelMap sharded label lookup")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert, verify and erase labels from many threads at once
    Stress {
        /// Number of writer threads
        #[arg(short = 't', long, default_value = "16")]
        threads: usize,

        /// Distinct labels inserted by each thread
        #[arg(short = 'n', long, default_value = "10000")]
        labels_per_thread: u64,

        /// Number of lock stripes
        #[arg(short = 's', long, default_value_t = DEFAULT_SHARD_COUNT)]
        shard_count: usize,

        /// Routing hash seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Erase every Nth label after the first verification (0 = none)
        #[arg(long, default_value = "0")]
        erase_every: u64,

        /// Write per-tag, per-thread timings as CSV
        #[arg(long)]
        profile_csv: Option<PathBuf>,

        /// Write per-tag, per-thread timings as JSON
        #[arg(long)]
        profile_json: Option<PathBuf>,

        /// Print the timing report to stderr
        #[arg(long)]
        report: bool,
    },

    /// Show how sequential labels spread over the shards
    Distribution {
        /// Number of labels to insert
        #[arg(short = 'n', long, default_value = "1000000")]
        labels: u64,

        /// Number of lock stripes
        #[arg(short = 's', long, default_value_t = DEFAULT_SHARD_COUNT)]
        shard_count: usize,

        /// Routing hash seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Stress {
            threads,
            labels_per_thread,
            shard_count,
            seed,
            erase_every,
            profile_csv,
            profile_json,
            report,
        } => {
            let config = StressConfig {
                threads,
                labels_per_thread,
                lookup: LookupConfig::default()
                    .with_shard_count(shard_count)
                    .with_hash_seed(seed)
                    .with_initial_capacity(threads.saturating_mul(labels_per_thread as usize)),
                erase_every,
            };
            let profiling = profile_csv.is_some() || profile_json.is_some() || report;
            let profiler = profiling.then(|| Arc::new(Profiler::new()));

            cmd_stress(&config, profiler.clone())?;

            if let Some(profiler) = profiler {
                if report {
                    profiler
                        .report(&mut std::io::stderr())
                        .context("Failed to print timing report")?;
                }
                if let Some(path) = profile_csv {
                    profiler
                        .export_csv(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                if let Some(path) = profile_json {
                    profiler
                        .export_json(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
            }
        }

        Commands::Distribution {
            labels,
            shard_count,
            seed,
        } => {
            let config = LookupConfig::default()
                .with_shard_count(shard_count)
                .with_hash_seed(seed)
                .with_initial_capacity(labels as usize);
            let stats = run_distribution(labels, &config).context("Invalid lookup configuration")?;
            print_stats(&stats);
        }
    }

    Ok(())
}

fn cmd_stress(config: &StressConfig, profiler: Option<Arc<Profiler>>) -> Result<()> {
    let report = run_stress(config, profiler).context("Invalid lookup configuration")?;

    println!("Inserted:        {}", report.inserted);
    println!("Erased:          {}", report.erased);
    println!("Final entries:   {}", report.final_entries);
    println!(
        "Insert phase:    {:.2} ms ({:.0} inserts/s)",
        report.insert_elapsed.as_secs_f64() * 1000.0,
        report.insert_throughput()
    );
    println!(
        "Verify phase:    {:.2} ms",
        report.verify_elapsed.as_secs_f64() * 1000.0
    );
    print_stats(&report.stats);

    if !report.is_consistent() {
        warn!(
            missing = report.missing,
            wrong_id = report.wrong_id,
            resurrected = report.resurrected,
            "Verification failed"
        );
        bail!(
            "lookup inconsistent: {} missing, {} wrong id, {} resurrected",
            report.missing,
            report.wrong_id,
            report.resurrected
        );
    }

    info!("All mappings verified");
    Ok(())
}

fn print_stats(stats: &LookupStats) {
    println!("Shards:          {}", stats.shard_count);
    println!("Entries:         {}", stats.entries);
    println!(
        "Shard load:      min {} / max {} ({} empty)",
        stats.min_shard_len, stats.max_shard_len, stats.empty_shards
    );
    println!("Imbalance:       {:.3} (max / mean)", stats.imbalance);
}
