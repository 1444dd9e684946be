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
use globset::{Glob, GlobMatcher};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::shard::IndexShard;

use super::registry::ShardRegistry;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub removed: usize,
}

/// What the loaded instance of a key was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Seen {
    mtime: Option<SystemTime>,
    len: u64,
    file_id: Option<(u64, u64)>,
}

#[cfg(unix)]
fn file_id(meta: &Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_id(_meta: &Metadata) -> Option<(u64, u64)> {
    None
}

/// Keeps a registry in step with the shard files of one directory.
pub struct DirectoryLoader {
    dir: PathBuf,
    matcher: GlobMatcher,
    registry: Arc<ShardRegistry>,
    seen: Mutex<HashMap<String, Seen>>,
}

impl DirectoryLoader {
    /// `glob` is matched against file names, e.g. `*.zoekt`.
    pub fn new(dir: impl AsRef<Path>, glob: &str, registry: Arc<ShardRegistry>) -> Result<Self> {
        let matcher = Glob::new(glob)
            .with_context(|| format!("invalid shard glob {:?}", glob))?
            .compile_matcher();
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            matcher,
            registry,
            seen: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Arc<ShardRegistry> {
        &self.registry
    }

    /// Load new or modified shard files and drop the ones that disappeared.
    ///
    /// When a changed file fails to open, the previous instance stays
    /// installed only if the file was replaced by a rename: the old mapping
    /// then still points at the unlinked file. A file rewritten in place
    /// would pull the pages out from under that mapping, so its key is
    /// dropped instead.
    pub fn rescan(&self) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let mut present = HashSet::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("read index dir {}", self.dir.display()))?;
        let mut seen = self.seen.lock();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(dir = %self.dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            let Some(name) = path.file_name() else { continue };
            if !self.matcher.is_match(name) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping vanished entry");
                    continue;
                }
            };
            let key = path.display().to_string();
            let current = Seen {
                mtime: meta.modified().ok(),
                len: meta.len(),
                file_id: file_id(&meta),
            };
            present.insert(key.clone());

            if current.mtime.is_some()
                && seen.get(&key) == Some(&current)
                && self.registry.get(&key).is_some()
            {
                report.unchanged += 1;
                continue;
            }
            match IndexShard::open(&path) {
                Ok(shard) => {
                    tracing::info!(
                        shard = %key,
                        repo = %shard.repository().name,
                        docs = shard.doc_count(),
                        "loaded shard"
                    );
                    self.registry.replace(key.clone(), Arc::new(shard));
                    seen.insert(key, current);
                    report.loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(shard = %key, error = %e, "failed to load shard");
                    report.failed += 1;
                    let renamed = matches!(
                        (seen.get(&key).and_then(|s| s.file_id), current.file_id),
                        (Some(old), Some(new)) if old != new
                    );
                    if !renamed
                        && seen.remove(&key).is_some()
                        && self.registry.remove(&key).is_some()
                    {
                        tracing::info!(shard = %key, "unloaded shard rewritten in place");
                        report.removed += 1;
                    }
                }
            }
        }

        let gone: Vec<String> = seen
            .keys()
            .filter(|k| !present.contains(*k))
            .cloned()
            .collect();
        for key in gone {
            seen.remove(&key);
            if self.registry.remove(&key).is_some() {
                tracing::info!(shard = %key, "unloaded shard");
                report.removed += 1;
            }
        }
        Ok(report)
    }
}
