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

use anyhow::{bail, Context, Result};
use reqwest::Url;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_SOURCEGRAPH_URL: &str = "ZOEKT_INDEXSERVER_SOURCEGRAPH_URL";
pub const ENV_INDEX: &str = "ZOEKT_INDEXSERVER_INDEX";
pub const ENV_INTERVAL_SECONDS: &str = "ZOEKT_INDEXSERVER_INTERVAL_SECONDS";
pub const ENV_CPU_FRACTION: &str = "ZOEKT_INDEXSERVER_CPU_FRACTION";
pub const ENV_LISTEN: &str = "ZOEKT_INDEXSERVER_LISTEN";
pub const ENV_BUILDER: &str = "ZOEKT_INDEXSERVER_BUILDER";
pub const ENV_DEBUG: &str = "ZOEKT_INDEXSERVER_DEBUG";

/// Every variable `load_config` looks at.
pub const ENV_VARS: &[&str] = &[
    ENV_SOURCEGRAPH_URL,
    ENV_INDEX,
    ENV_INTERVAL_SECONDS,
    ENV_CPU_FRACTION,
    ENV_LISTEN,
    ENV_BUILDER,
    ENV_DEBUG,
];

#[derive(Clone, Debug, PartialEq)]
pub struct IndexServerConfig {
    /// Base URL of the repository directory service.
    pub sourcegraph_url: Option<String>,
    pub index_dir: PathBuf,
    pub interval: Duration,
    /// Fraction of the cores used for concurrent builds.
    pub cpu_fraction: f64,
    /// HTTP listen address; no server when unset.
    pub listen: Option<String>,
    /// Builder program; a bare name is looked up next to our own executable first.
    /// It must write `zoekt_rs` shards, or the collector cannot identify them.
    pub builder: String,
    /// Glob (file names inside `index_dir`) the stale collector looks at.
    pub shard_glob: String,
    pub request_timeout: Duration,
    pub debug: bool,
}

impl Default for IndexServerConfig {
    fn default() -> Self {
        let index_dir = std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join(".zoekt"))
            .unwrap_or_else(|| PathBuf::from(".zoekt"));
        Self {
            sourcegraph_url: None,
            index_dir,
            interval: Duration::from_secs(10 * 60),
            cpu_fraction: 0.25,
            listen: None,
            builder: "zoekt-archive-index".to_string(),
            shard_glob: "*.zoekt".to_string(),
            request_timeout: Duration::from_secs(60),
            debug: false,
        }
    }
}

impl IndexServerConfig {
    /// Startup checks; any failure here is fatal for the binary.
    pub fn validate(&self) -> Result<Url> {
        if !(self.cpu_fraction > 0.0 && self.cpu_fraction <= 1.0) {
            bail!("cpu_fraction must be between 0.0 and 1.0 (got {})", self.cpu_fraction);
        }
        if self.index_dir.as_os_str().is_empty() {
            bail!("must set --index");
        }
        let Some(raw) = self.sourcegraph_url.as_deref().filter(|s| !s.is_empty()) else {
            bail!("must set --sourcegraph-url");
        };
        let url = Url::parse(raw).with_context(|| format!("parse sourcegraph url {:?}", raw))?;
        if url.cannot_be_a_base() {
            bail!("sourcegraph url {} cannot be used as a base URL", url);
        }
        if self.interval.is_zero() {
            bail!("interval must be positive");
        }
        Ok(url)
    }

    /// Create the index directory when it does not exist yet.
    pub fn ensure_index_dir(&self) -> Result<()> {
        if !self.index_dir.is_dir() {
            fs::create_dir_all(&self.index_dir)
                .with_context(|| format!("create index dir {}", self.index_dir.display()))?;
        }
        Ok(())
    }
}

/// CLI-level options that override everything else.
#[derive(Clone, Debug, Default)]
pub struct MergeOpts {
    pub config_path: Option<PathBuf>,
    pub cli_sourcegraph_url: Option<String>,
    pub cli_index: Option<PathBuf>,
    pub cli_interval_seconds: Option<u64>,
    pub cli_cpu_fraction: Option<f64>,
    pub cli_listen: Option<String>,
    pub cli_builder: Option<String>,
    pub cli_debug: bool,
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load and merge the configuration from: defaults <- config file <- env vars <- CLI.
/// Environment values that do not parse are ignored.
pub fn load_config(mut base: IndexServerConfig, opts: MergeOpts) -> Result<IndexServerConfig> {
    if let Some(path) = opts.config_path.as_ref() {
        if path.exists() {
            let s = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let v: toml::Value =
                toml::from_str(&s).with_context(|| format!("parse config {}", path.display()))?;
            if let Some(u) = v.get("sourcegraph_url").and_then(|x| x.as_str()) {
                base.sourcegraph_url = Some(u.to_string());
            }
            if let Some(i) = v.get("index").and_then(|x| x.as_str()) {
                base.index_dir = PathBuf::from(i);
            }
            if let Some(t) = v.get("interval_seconds").and_then(|x| x.as_integer()) {
                base.interval = Duration::from_secs(t.max(0) as u64);
            }
            if let Some(f) = v
                .get("cpu_fraction")
                .and_then(|x| x.as_float().or_else(|| x.as_integer().map(|i| i as f64)))
            {
                base.cpu_fraction = f;
            }
            if let Some(l) = v.get("listen").and_then(|x| x.as_str()) {
                base.listen = Some(l.to_string());
            }
            if let Some(b) = v.get("builder").and_then(|x| x.as_str()) {
                base.builder = b.to_string();
            }
            if let Some(g) = v.get("shard_glob").and_then(|x| x.as_str()) {
                base.shard_glob = g.to_string();
            }
            if let Some(t) = v.get("request_timeout_seconds").and_then(|x| x.as_integer()) {
                base.request_timeout = Duration::from_secs(t.max(1) as u64);
            }
            if let Some(d) = v.get("debug").and_then(|x| x.as_bool()) {
                base.debug = d;
            }
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    // env vars override file
    if let Ok(u) = std::env::var(ENV_SOURCEGRAPH_URL) {
        base.sourcegraph_url = Some(u);
    }
    if let Ok(i) = std::env::var(ENV_INDEX) {
        base.index_dir = PathBuf::from(i);
    }
    if let Ok(t) = std::env::var(ENV_INTERVAL_SECONDS) {
        if let Ok(v) = t.parse::<u64>() {
            base.interval = Duration::from_secs(v);
        }
    }
    if let Ok(f) = std::env::var(ENV_CPU_FRACTION) {
        if let Ok(v) = f.parse::<f64>() {
            base.cpu_fraction = v;
        }
    }
    if let Ok(l) = std::env::var(ENV_LISTEN) {
        base.listen = Some(l);
    }
    if let Ok(b) = std::env::var(ENV_BUILDER) {
        base.builder = b;
    }
    if let Some(d) = std::env::var(ENV_DEBUG).ok().as_deref().and_then(parse_bool) {
        base.debug = d;
    }

    // CLI overrides everything
    if let Some(u) = opts.cli_sourcegraph_url {
        base.sourcegraph_url = Some(u);
    }
    if let Some(i) = opts.cli_index {
        base.index_dir = i;
    }
    if let Some(t) = opts.cli_interval_seconds {
        base.interval = Duration::from_secs(t);
    }
    if let Some(f) = opts.cli_cpu_fraction {
        base.cpu_fraction = f;
    }
    if let Some(l) = opts.cli_listen {
        base.listen = Some(l);
    }
    if let Some(b) = opts.cli_builder {
        base.builder = b;
    }
    if opts.cli_debug {
        base.debug = true;
    }
    Ok(base)
}
