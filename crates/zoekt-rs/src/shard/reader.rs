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
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::trigram::trigrams;
use crate::types::{Document, Repository};

use super::{ShardError, HEADER_LEN, MAGIC, VERSION};

fn bytes_at<'a>(buf: &'a [u8], off: usize, n: usize, what: &str) -> Result<&'a [u8]> {
    off.checked_add(n)
        .and_then(|end| buf.get(off..end))
        .with_context(|| format!("shard truncated while reading {} (off={})", what, off))
}

fn u16_at(buf: &[u8], off: usize, what: &str) -> Result<u16> {
    Ok(u16::from_le_bytes(bytes_at(buf, off, 2, what)?.try_into()?))
}

fn u32_at(buf: &[u8], off: usize, what: &str) -> Result<u32> {
    Ok(u32::from_le_bytes(bytes_at(buf, off, 4, what)?.try_into()?))
}

fn u64_at(buf: &[u8], off: usize, what: &str) -> Result<u64> {
    Ok(u64::from_le_bytes(bytes_at(buf, off, 8, what)?.try_into()?))
}

struct Header {
    doc_count: u32,
    meta: Range<usize>,
    docs_off: usize,
    content_off: usize,
}

fn parse_header(buf: &[u8]) -> Result<Header> {
    if buf.len() < HEADER_LEN {
        bail!("file too small ({} bytes)", buf.len());
    }
    let magic = u32_at(buf, 0, "magic")?;
    let ver = u32_at(buf, 4, "version")?;
    if magic != MAGIC {
        bail!("bad magic {:#x}", magic);
    }
    if ver != VERSION {
        bail!("unsupported shard version {} (want {})", ver, VERSION);
    }
    let meta_off = u64_at(buf, 12, "meta_off")? as usize;
    let meta_len = u64_at(buf, 20, "meta_len")? as usize;
    Ok(Header {
        doc_count: u32_at(buf, 8, "doc_count")?,
        meta: meta_off..meta_off.saturating_add(meta_len),
        docs_off: u64_at(buf, 28, "docs_off")? as usize,
        content_off: u64_at(buf, 36, "content_off")? as usize,
    })
}

/// Read only the repository metadata of a shard file.
pub fn read_repository(path: impl AsRef<Path>) -> Result<Repository> {
    let path = path.as_ref();
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut head = [0u8; HEADER_LEN];
    f.read_exact(&mut head)
        .with_context(|| format!("read header of {}", path.display()))?;
    let header = parse_header(&head).with_context(|| format!("parse {}", path.display()))?;
    let len = header.meta.end - header.meta.start;
    let file_len = f.metadata()?.len() as usize;
    if header.meta.end > file_len {
        bail!(
            "{}: metadata section {:?} exceeds file length {}",
            path.display(),
            header.meta,
            file_len
        );
    }
    let mut meta = vec![0u8; len];
    f.seek(SeekFrom::Start(header.meta.start as u64))?;
    f.read_exact(&mut meta)?;
    serde_json::from_slice(&meta)
        .with_context(|| format!("decode repository metadata of {}", path.display()))
}

enum Body {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Body {
    fn bytes(&self) -> &[u8] {
        match self {
            Body::Mapped(m) => &m[..],
            Body::Owned(v) => v,
        }
    }
}

/// Name length plus branch mask, content offset and content length.
const MIN_DOC_ENTRY: usize = 2 + 24;

struct DocEntry {
    name: String,
    branch_mask: u64,
    /// Absolute range inside the shard body; validated lazily.
    content: Range<usize>,
}

/// A loaded, searchable shard. Immutable once built; shared behind `Arc`.
pub struct IndexShard {
    path: Option<PathBuf>,
    repo: Repository,
    docs: Vec<DocEntry>,
    body: Body,
    trigrams: HashMap<[u8; 3], Vec<u32>>,
    /// Docs whose bounds were bad at load; always handed out as candidates so
    /// the failure is reported when they are evaluated.
    unchecked: Vec<u32>,
}

impl std::fmt::Debug for IndexShard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexShard")
            .field("path", &self.path)
            .field("repo", &self.repo.name)
            .field("docs", &self.docs.len())
            .finish()
    }
}

impl IndexShard {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        // The file is never modified in place: writers rename a new file over it.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("mmap {}", path.display()))?;
        let mut shard =
            Self::parse(Body::Mapped(mmap)).with_context(|| format!("load {}", path.display()))?;
        shard.path = Some(path.to_path_buf());
        Ok(shard)
    }

    /// Build a shard in memory through the same encoding as the on-disk form.
    pub fn from_documents(repo: Repository, docs: Vec<Document>) -> Result<Self> {
        let bytes = super::writer::encode(&repo, &docs)?;
        Self::parse(Body::Owned(bytes))
    }

    fn parse(body: Body) -> Result<Self> {
        let buf = body.bytes();
        let header = parse_header(buf)?;
        let meta = buf.get(header.meta.clone()).with_context(|| {
            format!(
                "metadata section {:?} exceeds shard length {}",
                header.meta,
                buf.len()
            )
        })?;
        let repo: Repository =
            serde_json::from_slice(meta).context("decode repository metadata")?;

        let table = buf.len().saturating_sub(header.docs_off);
        let min_table = (header.doc_count as usize).saturating_mul(MIN_DOC_ENTRY);
        if header.docs_off > buf.len() || min_table > table {
            bail!(
                "doc table of {} entries at {} does not fit in shard length {}",
                header.doc_count,
                header.docs_off,
                buf.len()
            );
        }

        let mut docs = Vec::new();
        let mut off = header.docs_off;
        for d in 0..header.doc_count {
            let n = u16_at(buf, off, "doc name length")? as usize;
            off += 2;
            let name = bytes_at(buf, off, n, "doc name")
                .with_context(|| format!("name of doc {}", d))?;
            let name = std::str::from_utf8(name)
                .with_context(|| format!("doc {} name is not valid UTF-8", d))?
                .to_string();
            off += n;
            let branch_mask = u64_at(buf, off, "branch mask")?;
            let rel = u64_at(buf, off + 8, "content offset")? as usize;
            let len = u64_at(buf, off + 16, "content length")? as usize;
            off += 24;
            let start = header.content_off.saturating_add(rel);
            docs.push(DocEntry {
                name,
                branch_mask,
                content: start..start.saturating_add(len),
            });
        }

        let mut tri: HashMap<[u8; 3], Vec<u32>> = HashMap::new();
        let mut unchecked = Vec::new();
        for (i, doc) in docs.iter().enumerate() {
            let i = i as u32;
            let Some(content) = buf.get(doc.content.clone()) else {
                unchecked.push(i);
                continue;
            };
            for t in trigrams(content) {
                let list = tri.entry(t).or_default();
                if list.last() != Some(&i) {
                    list.push(i);
                }
            }
        }
        if !unchecked.is_empty() {
            tracing::warn!(
                repo = %repo.name,
                docs = unchecked.len(),
                "shard has documents with out-of-bounds content"
            );
        }

        Ok(Self {
            path: None,
            repo,
            docs,
            body,
            trigrams: tri,
            unchecked,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn doc_name(&self, doc: u32) -> &str {
        &self.docs[doc as usize].name
    }

    pub fn doc_content(&self, doc: u32) -> Result<&[u8], ShardError> {
        let entry = &self.docs[doc as usize];
        self.body.bytes().get(entry.content.clone()).ok_or_else(|| {
            ShardError::Corrupt(format!(
                "{}: content of {} at {:?} is out of bounds",
                self.repo.name, entry.name, entry.content
            ))
        })
    }

    /// Names of the repository branches the document is part of.
    pub fn doc_branches(&self, doc: u32) -> Vec<String> {
        let mask = self.docs[doc as usize].branch_mask;
        self.repo
            .branches
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                1u64.checked_shl(*i as u32)
                    .is_some_and(|bit| mask & bit != 0)
            })
            .map(|(_, b)| b.name.clone())
            .collect()
    }

    /// Sorted documents that may contain `pattern` (case-insensitively).
    /// `None` when the pattern has no trigram and every document is a candidate.
    pub fn candidates(&self, pattern: &[u8]) -> Option<Vec<u32>> {
        let mut wanted: Vec<[u8; 3]> = trigrams(pattern).collect();
        if wanted.is_empty() {
            return None;
        }
        wanted.sort_unstable();
        wanted.dedup();

        let mut lists: Vec<&[u32]> = Vec::with_capacity(wanted.len());
        for t in &wanted {
            match self.trigrams.get(t) {
                Some(l) => lists.push(l),
                None => return Some(self.unchecked.clone()),
            }
        }
        lists.sort_by_key(|l| l.len());
        let mut acc: Vec<u32> = lists[0].to_vec();
        for l in &lists[1..] {
            acc = intersect_sorted(&acc, l);
            if acc.is_empty() {
                break;
            }
        }
        if !self.unchecked.is_empty() {
            acc = union_sorted(&acc, &self.unchecked);
        }
        Some(acc)
    }
}

pub(crate) fn intersect_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

pub(crate) fn union_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}
