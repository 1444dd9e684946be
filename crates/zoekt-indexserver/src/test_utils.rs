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

//! Test utilities shared by unit and integration tests.
//!
//! Environment variable management, logging setup, and in-process fakes for
//! the two outside seams of the scheduler.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::builder::{BuildError, BuildOutput, BuildRequest, ShardBuilder};
use crate::directory::{RepoDirectory, ResolveError};

/// Test helper to manage environment variables and ensure proper cleanup
pub struct EnvGuard {
    original_values: HashMap<String, Option<String>>,
}

impl EnvGuard {
    pub fn new() -> Self {
        Self {
            original_values: HashMap::new(),
        }
    }

    pub fn save_and_clear(&mut self, vars: &[&str]) {
        for &var in vars {
            let original = std::env::var(var).ok();
            self.original_values.insert(var.to_string(), original);
            std::env::remove_var(var);
        }
    }

    pub fn set(&self, var: &str, value: &str) {
        std::env::set_var(var, value);
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (var, original_value) in &self.original_values {
            match original_value {
                Some(value) => std::env::set_var(var, value),
                None => std::env::remove_var(var),
            }
        }
    }
}

impl Default for EnvGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize tracing only once for tests. Respects RUST_LOG when set.
pub fn init_test_logging() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,hyper_util=warn,hyper=warn,reqwest=warn")
        });
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

pub const FAKE_COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

/// Directory with a settable listing. Repositories resolve to `FAKE_COMMIT`
/// unless given an explicit answer with `set_revision`.
pub struct FakeDirectory {
    listing: Mutex<std::result::Result<Vec<String>, String>>,
    revisions: Mutex<HashMap<String, std::result::Result<String, ResolveError>>>,
    pub list_calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn new(repos: &[&str]) -> Self {
        Self {
            listing: Mutex::new(Ok(repos.iter().map(|s| s.to_string()).collect())),
            revisions: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_repos(&self, repos: &[&str]) {
        *self.listing.lock() = Ok(repos.iter().map(|s| s.to_string()).collect());
    }

    pub fn fail_listing(&self, msg: &str) {
        *self.listing.lock() = Err(msg.to_string());
    }

    pub fn set_revision(&self, repo: &str, answer: std::result::Result<String, ResolveError>) {
        self.revisions.lock().insert(repo.to_string(), answer);
    }
}

#[async_trait]
impl RepoDirectory for FakeDirectory {
    async fn list_repos(&self) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.listing.lock().clone().map_err(|e| anyhow!(e))
    }

    async fn resolve_revision(
        &self,
        repo: &str,
        _spec: &str,
    ) -> std::result::Result<String, ResolveError> {
        self.revisions
            .lock()
            .get(repo)
            .cloned()
            .unwrap_or_else(|| Ok(FAKE_COMMIT.to_string()))
    }

    fn tarball_url(&self, repo: &str, commit: &str) -> String {
        format!("http://fake/.internal/git/{}/tar/{}", repo, commit)
    }
}

/// Records every request, optionally sleeps, optionally fails for chosen
/// repositories, and can write a real shard so the collector has something
/// to look at.
#[derive(Default)]
pub struct FakeBuilder {
    requests: Mutex<Vec<BuildRequest>>,
    failing: Mutex<HashSet<String>>,
    delay: Duration,
    shard_dir: Option<PathBuf>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Write a one-document shard per successful build into `dir`.
    pub fn writing_shards(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shard_dir = Some(dir.into());
        self
    }

    pub fn fail_for(&self, repo: &str) {
        self.failing.lock().insert(repo.to_string());
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.requests.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShardBuilder for FakeBuilder {
    async fn build(&self, req: &BuildRequest) -> std::result::Result<BuildOutput, BuildError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().push(req.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().contains(&req.name) {
            return Err(BuildError::Failed {
                status: Some(1),
                output: BuildOutput {
                    stdout: String::new(),
                    stderr: format!("fake failure for {}", req.name),
                },
            });
        }
        if let Some(dir) = &self.shard_dir {
            let path = dir.join(zoekt_rs::shard::shard_file_name(&req.name));
            let repo = zoekt_rs::Repository::new(&req.name).with_branch(&req.branch, &req.commit);
            zoekt_rs::ShardWriter::new(path)
                .write(&repo, &[zoekt_rs::Document::new("README", "fake")])
                .map_err(|e| BuildError::Io(std::io::Error::other(e.to_string())))?;
        }
        Ok(BuildOutput::default())
    }
}
