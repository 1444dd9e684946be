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

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::types::{Document, Repository};

use super::{MAGIC, SHARD_SUFFIX, VERSION};

pub struct ShardWriter {
    path: PathBuf,
}

impl ShardWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the shard next to its final name and rename it into place.
    pub fn write(&self, repo: &Repository, docs: &[Document]) -> Result<()> {
        let start = Instant::now();
        let bytes = encode(repo, docs)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("create shard file {}", tmp.display()))?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path).with_context(|| {
            format!("rename {} -> {}", tmp.display(), self.path.display())
        })?;

        tracing::debug!(
            path = %self.path.display(),
            repo = %repo.name,
            docs = docs.len(),
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "wrote shard"
        );
        Ok(())
    }
}

/// Serialize a repository and its documents into the shard layout.
pub(crate) fn encode(repo: &Repository, docs: &[Document]) -> Result<Vec<u8>> {
    if repo.branches.len() > 64 {
        bail!(
            "repository {} has {} branches; at most 64 fit in a shard",
            repo.name,
            repo.branches.len()
        );
    }
    let all_branches: u64 = match repo.branches.len() {
        0 => 0,
        64 => u64::MAX,
        n => (1u64 << n) - 1,
    };

    let meta = serde_json::to_vec(repo).context("encode repository metadata")?;

    let mut table = Vec::new();
    let mut content_len = 0u64;
    for d in docs {
        let name = d.name.as_bytes();
        if name.len() > u16::MAX as usize {
            bail!("path too long: {}", d.name);
        }
        let mask = if d.branches.is_empty() {
            all_branches
        } else {
            let mut m = 0u64;
            for b in &d.branches {
                let Some(i) = repo.branches.iter().position(|rb| &rb.name == b) else {
                    bail!("document {} names unknown branch {}", d.name, b);
                };
                m |= 1 << i;
            }
            m
        };
        table.extend(&(name.len() as u16).to_le_bytes());
        table.extend(name);
        table.extend(&mask.to_le_bytes());
        table.extend(&content_len.to_le_bytes());
        table.extend(&(d.content.len() as u64).to_le_bytes());
        content_len += d.content.len() as u64;
    }

    let meta_off = super::HEADER_LEN as u64;
    let docs_off = meta_off + meta.len() as u64;
    let content_off = docs_off + table.len() as u64;

    let mut out = Vec::with_capacity(content_off as usize + content_len as usize);
    out.extend(&MAGIC.to_le_bytes());
    out.extend(&VERSION.to_le_bytes());
    out.extend(&(docs.len() as u32).to_le_bytes());
    out.extend(&meta_off.to_le_bytes());
    out.extend(&(meta.len() as u64).to_le_bytes());
    out.extend(&docs_off.to_le_bytes());
    out.extend(&content_off.to_le_bytes());
    out.extend(&meta);
    out.extend(&table);
    for d in docs {
        out.extend(&d.content);
    }
    Ok(out)
}

/// File name for a repository's shard: `/` and `%` are escaped so the
/// name stays a single path component.
pub fn shard_file_name(repo_name: &str) -> String {
    let mut out = String::with_capacity(repo_name.len() + 16);
    for c in repo_name.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            c => out.push(c),
        }
    }
    out.push_str(&format!("_v{}.00000{}", super::VERSION, SHARD_SUFFIX));
    out
}
