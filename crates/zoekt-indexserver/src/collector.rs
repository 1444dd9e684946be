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

//! Removal of shards whose repository is no longer listed.
//!
//! A shard is only deleted after its metadata was read and the repository
//! name in it is absent from the desired set. Anything that cannot be read
//! (half-written, corrupt, foreign format) is left in place.

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CollectReport {
    pub removed: Vec<PathBuf>,
    /// Files matching the glob whose owner could not be determined.
    pub unidentified: Vec<PathBuf>,
    pub kept: usize,
}

#[derive(Clone)]
pub struct StaleShardCollector {
    dir: PathBuf,
    matcher: GlobMatcher,
}

impl StaleShardCollector {
    pub fn new(dir: impl AsRef<Path>, glob: &str) -> Result<Self> {
        let matcher = Glob::new(glob)
            .with_context(|| format!("invalid shard glob {:?}", glob))?
            .compile_matcher();
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            matcher,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn collect(&self, desired: &HashSet<String>) -> Result<CollectReport> {
        let mut report = CollectReport::default();
        if desired.is_empty() {
            tracing::warn!(dir = %self.dir.display(), "empty desired set, not collecting");
            return Ok(report);
        }

        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("read index dir {}", self.dir.display()))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.file_name().is_some_and(|n| self.matcher.is_match(n)))
            .collect();
        paths.sort();

        for path in paths {
            let repo = match zoekt_rs::read_repository(&path) {
                Ok(repo) => repo,
                Err(e) => {
                    tracing::debug!(shard = %path.display(), error = %e, "cannot identify shard owner");
                    report.unidentified.push(path);
                    continue;
                }
            };
            if desired.contains(&repo.name) {
                report.kept += 1;
                continue;
            }
            tracing::info!("{} no longer exists, deleting {}", repo.name, path.display());
            match std::fs::remove_file(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(shard = %path.display(), error = %e, "failed to delete stale shard")
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoekt_rs::{Document, Repository, ShardWriter};

    fn write(dir: &Path, repo: &str) -> PathBuf {
        let path = dir.join(zoekt_rs::shard::shard_file_name(repo));
        ShardWriter::new(&path)
            .write(
                &Repository::new(repo).with_branch("HEAD", "abc"),
                &[Document::new("README", "hello")],
            )
            .unwrap();
        path
    }

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_unlisted_repos_are_removed() {
        let td = tempfile::tempdir().unwrap();
        let a = write(td.path(), "github.com/x/a");
        let b = write(td.path(), "github.com/x/b");
        let c = write(td.path(), "github.com/x/c");

        let collector = StaleShardCollector::new(td.path(), "*.zoekt").unwrap();
        let report = collector.collect(&set(&["github.com/x/a", "github.com/x/b"])).unwrap();
        assert_eq!(report.removed, vec![c.clone()]);
        assert_eq!(report.kept, 2);
        assert!(a.exists() && b.exists() && !c.exists());
    }

    #[test]
    fn empty_desired_set_deletes_nothing() {
        let td = tempfile::tempdir().unwrap();
        let a = write(td.path(), "github.com/x/a");
        let report = StaleShardCollector::new(td.path(), "*.zoekt")
            .unwrap()
            .collect(&HashSet::new())
            .unwrap();
        assert!(report.removed.is_empty());
        assert!(a.exists());
    }

    #[test]
    fn unreadable_files_are_kept() {
        let td = tempfile::tempdir().unwrap();
        let junk = td.path().join("junk_v1.00000.zoekt");
        std::fs::write(&junk, b"not a shard").unwrap();
        let other = td.path().join("notes.txt");
        std::fs::write(&other, b"x").unwrap();

        let report = StaleShardCollector::new(td.path(), "*.zoekt")
            .unwrap()
            .collect(&set(&["github.com/x/a"]))
            .unwrap();
        assert_eq!(report.unidentified, vec![junk.clone()]);
        assert!(report.removed.is_empty());
        assert!(junk.exists() && other.exists());
    }
}
