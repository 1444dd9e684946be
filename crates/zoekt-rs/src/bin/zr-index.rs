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

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use zoekt_rs::shard::shard_file_name;
use zoekt_rs::{IndexBuilder, IndexShard, Repository, ShardWriter};

#[derive(Parser, Debug)]
#[command(name = "zr-index", about = "Index a local directory into a shard file")]
struct Args {
    /// Path to the source tree
    dir: PathBuf,
    /// Repository name stored in the shard (defaults to the directory name)
    #[arg(long)]
    name: Option<String>,
    /// Output shard path (defaults to <name>_v1.00000.zoekt in the current directory)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Branch recorded for every document
    #[arg(long, default_value = "HEAD")]
    branch: String,
    /// Commit recorded for the branch
    #[arg(long, default_value = "")]
    commit: String,
    /// Maximum file size in bytes to index (skip larger files)
    #[arg(long, default_value_t = 1_000_000)]
    max_file_size: u64,
    /// Build the shard in memory only
    #[arg(long)]
    no_write: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let name = match args.name {
        Some(n) => n,
        None => args
            .dir
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().into_owned()))
            .context("cannot derive a repository name; pass --name")?,
    };
    let repo = Repository::new(&name).with_branch(&args.branch, &args.commit);
    let docs = IndexBuilder::new(&args.dir)
        .max_file_size(args.max_file_size)
        .build()?;

    if args.no_write {
        let shard = IndexShard::from_documents(repo, docs)?;
        println!("built shard in memory: {} docs", shard.doc_count());
        return Ok(());
    }

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(shard_file_name(&name)));
    if let Some(p) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(p).with_context(|| format!("create {}", p.display()))?;
    }
    ShardWriter::new(&out).write(&repo, &docs)?;
    println!("wrote shard: {} ({} docs)", out.display(), docs.len());
    Ok(())
}
