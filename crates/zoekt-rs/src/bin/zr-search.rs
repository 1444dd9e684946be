// Copyright 2025 HyperZoekt Project
// Derived from sourcegraph/zoekt (https://github.com/sourcegraph/zoekt)
// Copyright 2016 Google Inc. All rights reserved.
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

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use zoekt_rs::{DirectoryLoader, Query, SearchOptions, ShardRegistry, ShardedSearcher};

#[derive(Parser, Debug)]
#[command(name = "zr-search", about = "Search a directory of shard files")]
struct Args {
    /// Directory holding *.zoekt shards
    #[arg(long)]
    index: PathBuf,
    /// Query, e.g. `needle repo:github.com/foo -file:test`
    query: String,
    /// Emit JSON (NDJSON, one file match per line)
    #[arg(long)]
    json: bool,
    /// Stop after this many matches
    #[arg(long)]
    max_matches: Option<usize>,
    /// Give up after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Parallel shard searches (defaults to the number of CPUs)
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let q = Query::parse(&args.query)?;

    let registry = Arc::new(ShardRegistry::new());
    let loader = DirectoryLoader::new(&args.index, "*.zoekt", Arc::clone(&registry))?;
    let report = loader.rescan()?;
    tracing::info!(loaded = report.loaded, failed = report.failed, "shards loaded");

    let workers = args.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    let opts = SearchOptions {
        total_max_match_count: args.max_matches,
        max_wall_time: args.timeout_ms.map(Duration::from_millis),
        ..Default::default()
    };
    let res = ShardedSearcher::new(registry, workers).search(&q, &opts).await?;

    if args.json {
        for fm in &res.files {
            println!("{}", serde_json::to_string(fm)?);
        }
    } else {
        for fm in &res.files {
            if fm.line_matches.is_empty() {
                println!("{}/{}", fm.repository, fm.file_name);
            }
            for lm in &fm.line_matches {
                if lm.file_name {
                    println!("{}/{}", fm.repository, fm.file_name);
                } else {
                    println!(
                        "{}/{}:{}:{}",
                        fm.repository, fm.file_name, lm.line_number, lm.line
                    );
                }
            }
        }
    }
    eprintln!(
        "{} files, {} matches, {} shards ({} skipped, {} errors){} in {:?}",
        res.stats.file_count,
        res.stats.match_count,
        res.stats.shards_scanned,
        res.stats.shards_skipped,
        res.stats.shard_errors,
        if res.stats.cancelled { ", truncated" } else { "" },
        res.stats.duration
    );
    Ok(())
}
