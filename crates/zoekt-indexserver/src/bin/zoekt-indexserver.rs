// Copyright 2025 HyperZoekt Project
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
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use zoekt_indexserver::{
    http, load_config, ArchiveIndexCommand, HttpRepoDirectory, IndexServerConfig, MergeOpts,
    RepoDirectory, Scheduler, SchedulerConfig, ShardBuilder,
};

#[derive(Parser, Debug)]
#[command(
    name = "zoekt-indexserver",
    about = "Periodically reindex enabled repositories into a shard directory"
)]
struct Opts {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Base URL of the repository directory service
    #[arg(long)]
    sourcegraph_url: Option<String>,
    /// Directory holding the shards
    #[arg(long)]
    index: Option<PathBuf>,
    /// Seconds between reindex cycles
    #[arg(long)]
    interval: Option<u64>,
    /// Fraction of the cores used for concurrent builds
    #[arg(long)]
    cpu_fraction: Option<f64>,
    /// Serve the reindex page and traces on this address, e.g. 127.0.0.1:6072
    #[arg(long)]
    listen: Option<String>,
    /// Shard builder program
    ///
    /// It must write shards in the zoekt-rs shard format (the one `zr-index`
    /// writes). Shards in another format are never identified, so stale ones
    /// are never collected.
    #[arg(long)]
    builder: Option<String>,
    /// Log builder output of successful builds
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();
    let cfg = load_config(
        IndexServerConfig::default(),
        MergeOpts {
            config_path: opts.config,
            cli_sourcegraph_url: opts.sourcegraph_url,
            cli_index: opts.index,
            cli_interval_seconds: opts.interval,
            cli_cpu_fraction: opts.cpu_fraction,
            cli_listen: opts.listen,
            cli_builder: opts.builder,
            cli_debug: opts.debug,
        },
    )?;
    let root = cfg.validate()?;
    cfg.ensure_index_dir()?;

    let directory: Arc<dyn RepoDirectory> =
        Arc::new(HttpRepoDirectory::new(root, cfg.request_timeout)?);
    let builder = ArchiveIndexCommand::new(&cfg.builder, &cfg.index_dir);
    tracing::info!(builder = %builder.program().display(), "using shard builder");
    let builder: Arc<dyn ShardBuilder> = Arc::new(builder);
    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig::from_config(&cfg),
        directory,
        builder,
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let http_task = match cfg.listen.as_deref() {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("bind {}", addr))?;
            let app = http::router(Arc::clone(&scheduler));
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = http::serve(listener, app, rx).await {
                    tracing::error!(error = %format!("{:#}", e), "http server failed");
                }
            }))
        }
        None => None,
    };

    let sched_task = tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx));

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    tracing::info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sched_task.await {
        tracing::warn!(error = %e, "scheduler task ended abnormally");
    }
    if let Some(h) = http_task {
        let _ = h.await;
    }
    Ok(())
}
