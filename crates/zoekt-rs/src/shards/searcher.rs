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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::query::{simplify, Query, QueryError};
use crate::shard::ShardError;
use crate::types::{SearchOptions, SearchResult, Stats};

use super::eval::search_shard;
use super::merge::Merger;
use super::registry::ShardRegistry;

type ShardOutcome = (String, Result<Result<SearchResult, ShardError>, tokio::task::JoinError>);

/// Runs a query over every shard of a registry snapshot with bounded
/// parallelism. Shards evaluate on the blocking pool.
#[derive(Clone)]
pub struct ShardedSearcher {
    registry: Arc<ShardRegistry>,
    workers: usize,
}

impl ShardedSearcher {
    pub fn new(registry: Arc<ShardRegistry>, workers: usize) -> Self {
        Self {
            registry,
            workers: workers.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<ShardRegistry> {
        &self.registry
    }

    pub async fn search(
        &self,
        q: &Query,
        opts: &SearchOptions,
    ) -> Result<SearchResult, QueryError> {
        let start = Instant::now();
        q.validate()?;
        let q = Arc::new(simplify(q));
        let opts = Arc::new(opts.clone());
        let snapshot = self.registry.snapshot();
        let cancel = Arc::new(AtomicBool::new(false));
        let permits = Arc::new(Semaphore::new(self.workers));

        tracing::debug!(query = %q, shards = snapshot.len(), workers = self.workers, "search");

        let mut set: JoinSet<Option<ShardOutcome>> = JoinSet::new();
        for (key, shard) in snapshot.iter() {
            let key = key.clone();
            let shard = Arc::clone(shard);
            let q = Arc::clone(&q);
            let opts = Arc::clone(&opts);
            let cancel = Arc::clone(&cancel);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let res = tokio::task::spawn_blocking(move || {
                    search_shard(&shard, &q, &opts, &cancel)
                })
                .await;
                Some((key, res))
            });
        }

        let deadline = opts
            .max_wall_time
            .map(|d| tokio::time::Instant::now() + d);
        let mut stats = Stats::default();
        let mut merger = Merger::default();
        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, set.join_next()).await {
                    Ok(n) => n,
                    Err(_) => {
                        tracing::debug!("search deadline reached");
                        stats.cancelled = true;
                        break;
                    }
                },
                None => set.join_next().await,
            };
            let Some(joined) = next else { break };
            match joined {
                Ok(Some((_, Ok(Ok(res))))) => {
                    stats.add(&res.stats);
                    stats.cancelled |= res.stats.cancelled;
                    merger.add(res.files);
                    if opts
                        .total_max_match_count
                        .is_some_and(|limit| merger.match_count() >= limit)
                    {
                        stats.cancelled = true;
                        break;
                    }
                }
                Ok(Some((key, Ok(Err(e))))) => {
                    tracing::warn!(shard = %key, error = %e, "shard search failed");
                    stats.shard_errors += 1;
                }
                Ok(Some((key, Err(e)))) => {
                    tracing::warn!(shard = %key, error = %e, "shard search task failed");
                    stats.shard_errors += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "shard search task failed");
                    stats.shard_errors += 1;
                }
            }
        }
        // Blocking evaluations still running observe the flag between documents.
        cancel.store(true, Ordering::Relaxed);
        set.abort_all();

        let mut files = merger.finish();
        if let Some(n) = opts.max_doc_display_count {
            files.truncate(n);
        }
        stats.file_count = files.len();
        stats.match_count = files.iter().map(|f| f.match_count()).sum();
        stats.duration = start.elapsed();
        Ok(SearchResult { files, stats })
    }
}
