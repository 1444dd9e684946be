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

//! Periodic reindex loop.
//!
//! Each cycle lists the enabled repositories, builds every one of them with at
//! most `cpu_count` builds in flight, waits for all of them and then removes
//! shards of repositories that were not listed. Failures never end the loop;
//! the next tick is the retry.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::builder::{BuildRequest, ShardBuilder};
use crate::collector::{CollectReport, StaleShardCollector};
use crate::directory::{RepoDirectory, ResolveError};
use crate::trace::TraceLog;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub index_dir: PathBuf,
    pub interval: Duration,
    /// Maximum number of repositories processed at once.
    pub cpu_count: usize,
    pub shard_glob: String,
    /// Log builder output of successful builds too.
    pub debug: bool,
}

impl SchedulerConfig {
    pub fn from_config(cfg: &crate::IndexServerConfig) -> Self {
        Self {
            index_dir: cfg.index_dir.clone(),
            interval: cfg.interval,
            cpu_count: cpu_count(cfg.cpu_fraction),
            shard_glob: cfg.shard_glob.clone(),
            debug: cfg.debug,
        }
    }
}

/// `max(1, round(cores * fraction))`.
pub fn cpu_count(fraction: f64) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    scaled_cpu_count(cores, fraction)
}

fn scaled_cpu_count(cores: usize, fraction: f64) -> usize {
    let n = (cores as f64 * fraction).round();
    if n.is_finite() && n >= 1.0 {
        n as usize
    } else {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Built { commit: String },
    /// The repository has no HEAD; an empty shard was built for it.
    Empty,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub built: usize,
    pub empty: usize,
    pub failed: usize,
    /// None when collection was skipped or failed.
    pub collected: Option<CollectReport>,
}

pub struct Scheduler {
    cfg: SchedulerConfig,
    directory: Arc<dyn RepoDirectory>,
    builder: Arc<dyn ShardBuilder>,
    collector: StaleShardCollector,
    permits: Arc<Semaphore>,
    repos: RwLock<Vec<String>>,
    traces: TraceLog,
}

impl Scheduler {
    pub fn new(
        cfg: SchedulerConfig,
        directory: Arc<dyn RepoDirectory>,
        builder: Arc<dyn ShardBuilder>,
    ) -> Result<Self> {
        let collector = StaleShardCollector::new(&cfg.index_dir, &cfg.shard_glob)?;
        let permits = Arc::new(Semaphore::new(cfg.cpu_count.max(1)));
        Ok(Self {
            cfg,
            directory,
            builder,
            collector,
            permits,
            repos: RwLock::new(Vec::new()),
            traces: TraceLog::default(),
        })
    }

    pub fn with_traces(mut self, traces: TraceLog) -> Self {
        self.traces = traces;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    pub fn traces(&self) -> &TraceLog {
        &self.traces
    }

    /// Names from the most recent successful listing.
    pub fn repos(&self) -> Vec<String> {
        self.repos.read().clone()
    }

    /// Run cycles every `interval` until `shutdown` changes or its sender is dropped.
    /// The first cycle starts immediately.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval = ?self.cfg.interval,
            cpu_count = self.cfg.cpu_count,
            index = %self.cfg.index_dir.display(),
            "scheduler: starting"
        );
        let mut ticker = tokio::time::interval(self.cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            tokio::select! {
                res = self.run_cycle() => match res {
                    Ok(report) => tracing::info!(
                        listed = report.listed,
                        built = report.built,
                        empty = report.empty,
                        failed = report.failed,
                        removed = report.collected.as_ref().map(|c| c.removed.len()).unwrap_or(0),
                        "scheduler: cycle done"
                    ),
                    Err(e) => tracing::warn!(error = %format!("{:#}", e), "scheduler: cycle aborted"),
                },
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("scheduler: exiting");
    }

    /// One list -> build -> collect pass. Only a failed listing is an error.
    pub async fn run_cycle(self: &Arc<Self>) -> Result<CycleReport> {
        let trace = self.traces.start("cycle", "reindex");
        let started = Instant::now();
        let repos = match self.directory.list_repos().await {
            Ok(r) => r,
            Err(e) => {
                trace.fail(format!("list failed: {:#}", e));
                return Err(e.context("list repositories"));
            }
        };
        trace.event(format!("listed {} repositories", repos.len()));
        *self.repos.write() = repos.clone();

        let mut report = CycleReport {
            listed: repos.len(),
            ..Default::default()
        };

        let mut tasks = JoinSet::new();
        for name in repos.iter().cloned() {
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .context("scheduler semaphore closed")?;
            let this = Arc::clone(self);
            tasks.spawn(async move {
                let _permit = permit;
                let res = this.index(&name).await;
                (name, res)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(IndexOutcome::Built { .. }))) => report.built += 1,
                Ok((_, Ok(IndexOutcome::Empty))) => report.empty += 1,
                Ok((name, Err(e))) => {
                    tracing::warn!(repo = %name, error = %format!("{:#}", e), "scheduler: index failed");
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: index task died");
                    report.failed += 1;
                }
            }
        }
        trace.event(format!(
            "built {} empty {} failed {}",
            report.built, report.empty, report.failed
        ));

        if repos.is_empty() {
            tracing::warn!("scheduler: repository list is empty, skipping stale shard collection");
            trace.event("collection skipped");
        } else {
            let desired: HashSet<String> = repos.into_iter().collect();
            let collector = self.collector.clone();
            match tokio::task::spawn_blocking(move || collector.collect(&desired)).await {
                Ok(Ok(c)) => {
                    trace.event(format!("removed {} stale shards", c.removed.len()));
                    report.collected = Some(c);
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %format!("{:#}", e), "scheduler: collection failed");
                    trace.fail(format!("collection failed: {:#}", e));
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: collection task died");
                    trace.fail(format!("collection task died: {}", e));
                }
            }
        }
        tracing::debug!(elapsed = ?started.elapsed(), "scheduler: cycle finished");
        Ok(report)
    }

    /// Resolve HEAD of `name` and run the builder for it.
    pub async fn index(&self, name: &str) -> Result<IndexOutcome> {
        let trace = self.traces.start("index", name);
        let (req, outcome) = match self.directory.resolve_revision(name, "HEAD").await {
            Ok(commit) => {
                trace.event(format!("HEAD is {}", commit));
                let url = self.directory.tarball_url(name, &commit);
                (
                    BuildRequest::from_tarball(name, &commit, url),
                    IndexOutcome::Built { commit },
                )
            }
            Err(ResolveError::NotFound) => {
                tracing::info!(repo = %name, "scheduler: HEAD not found, indexing as empty repository");
                trace.event("HEAD not found, building empty shard");
                (BuildRequest::empty_repo(name), IndexOutcome::Empty)
            }
            Err(e) => {
                trace.fail(format!("resolve HEAD: {}", e));
                return Err(anyhow::Error::new(e).context(format!("resolve HEAD of {}", name)));
            }
        };

        match self.builder.build(&req).await {
            Ok(out) => {
                if self.cfg.debug {
                    tracing::info!(repo = %name, stdout = %out.stdout, stderr = %out.stderr, "scheduler: builder output");
                }
                trace.event("build finished");
                Ok(outcome)
            }
            Err(e) => {
                if let Some(out) = e.output() {
                    tracing::warn!(repo = %name, stdout = %out.stdout, stderr = %out.stderr, "scheduler: builder failed");
                }
                trace.fail(e.to_string());
                Err(anyhow::Error::new(e).context(format!("build {}", name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_count_rounds_and_clamps() {
        assert_eq!(scaled_cpu_count(8, 0.25), 2);
        assert_eq!(scaled_cpu_count(6, 0.25), 2);
        assert_eq!(scaled_cpu_count(2, 0.25), 1);
        assert_eq!(scaled_cpu_count(1, 0.1), 1);
        assert_eq!(scaled_cpu_count(16, 1.0), 16);
        assert_eq!(scaled_cpu_count(4, f64::NAN), 1);
        assert!(cpu_count(0.25) >= 1);
    }
}
