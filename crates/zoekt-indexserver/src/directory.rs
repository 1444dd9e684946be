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

//! Client for the repository directory service.
//!
//! Three internal endpoints are used, all relative to the configured root:
//! `POST /.internal/repos/list`, `GET /.internal/git/{repo}/resolve-revision/{spec}`
//! and the tarball location `/.internal/git/{repo}/tar/{commit}` that is
//! handed to the builder.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{self, Display};
use std::time::Duration;

/// Why a revision could not be resolved. `NotFound` is the only variant the
/// scheduler treats as "the repository exists but is empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// 404: the repository has no such revision.
    NotFound,
    /// The request never produced a response.
    Transport(String),
    /// Any other non-200 answer.
    Status(u16),
    /// 200 with an empty body.
    EmptyRevision,
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound => write!(f, "revision not found"),
            ResolveError::Transport(s) => write!(f, "transport error: {}", s),
            ResolveError::Status(code) => write!(f, "unexpected status {}", code),
            ResolveError::EmptyRevision => write!(f, "empty revision"),
        }
    }
}

impl Error for ResolveError {}

#[async_trait]
pub trait RepoDirectory: Send + Sync {
    /// Names of all enabled repositories.
    async fn list_repos(&self) -> Result<Vec<String>>;
    /// Commit id `spec` currently points at in `repo`.
    async fn resolve_revision(&self, repo: &str, spec: &str) -> Result<String, ResolveError>;
    /// Location the builder downloads the archive of `repo` at `commit` from.
    fn tarball_url(&self, repo: &str, commit: &str) -> String;
}

#[derive(Deserialize)]
struct ListedRepo {
    #[serde(rename = "URI")]
    uri: String,
}

pub struct HttpRepoDirectory {
    root: Url,
    client: reqwest::Client,
}

impl HttpRepoDirectory {
    pub fn new(root: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { root, client })
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// `root` with its path replaced by `path`; query and fragment dropped.
    fn endpoint(&self, path: &str) -> Url {
        let mut u = self.root.clone();
        u.set_path(path);
        u.set_query(None);
        u.set_fragment(None);
        u
    }
}

#[async_trait]
impl RepoDirectory for HttpRepoDirectory {
    async fn list_repos(&self) -> Result<Vec<String>> {
        let url = self.endpoint("/.internal/repos/list");
        let resp = self
            .client
            .post(url.clone())
            .json(&serde_json::json!({ "Enabled": true }))
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;
        if resp.status() != StatusCode::OK {
            bail!("failed to list repositories: status {}", resp.status());
        }
        let listed: Vec<ListedRepo> = resp
            .json()
            .await
            .context("decode repository list")?;
        Ok(listed.into_iter().map(|r| r.uri).collect())
    }

    async fn resolve_revision(&self, repo: &str, spec: &str) -> Result<String, ResolveError> {
        let url = self.endpoint(&format!("/.internal/git/{}/resolve-revision/{}", repo, spec));
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;
        match resp.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(ResolveError::NotFound),
            other => return Err(ResolveError::Status(other.as_u16())),
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;
        let commit = body.trim();
        if commit.is_empty() {
            return Err(ResolveError::EmptyRevision);
        }
        Ok(commit.to_string())
    }

    fn tarball_url(&self, repo: &str, commit: &str) -> String {
        self.endpoint(&format!("/.internal/git/{}/tar/{}", repo, commit))
            .to_string()
    }
}
