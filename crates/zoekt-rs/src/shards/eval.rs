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

//! Evaluation of a query against one shard.
//!
//! Repo-scoped predicates (`type:repo`) are decided first: each one becomes a
//! constant saying whether any document of the shard satisfies its child.
//! Only then are documents evaluated one by one, and match fragments are
//! taken from the remaining positive leaves, never from a repo-scoped child.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::query::{simplify, simplify_repo, Query, TypeKind};
use crate::shard::{IndexShard, ShardError};
use crate::types::{FileMatch, LineFragment, LineMatch, SearchOptions, SearchResult};

/// Search a single shard. `cancel` is polled between documents.
pub fn search_shard(
    shard: &IndexShard,
    q: &Query,
    opts: &SearchOptions,
    cancel: &AtomicBool,
) -> Result<SearchResult, ShardError> {
    let mut res = SearchResult::default();
    let repo = shard.repository();

    let q = simplify_repo(q, &repo.name);
    if matches!(q.as_ref(), Query::Const(false)) {
        res.stats.shards_skipped = 1;
        return Ok(res);
    }
    res.stats.shards_scanned = 1;

    let q: Cow<'_, Query> = if q.has_repo_scope() {
        Cow::Owned(simplify(&resolve_repo_scoped(shard, &q)?))
    } else {
        q
    };
    if matches!(q.as_ref(), Query::Const(false)) {
        return Ok(res);
    }

    let candidates = required_docs(shard, &q);
    let docs: Box<dyn Iterator<Item = u32>> = match candidates {
        Some(list) => Box::new(list.into_iter()),
        None => Box::new(0..shard.doc_count()),
    };

    let mut fragments_seen = 0usize;
    for doc in docs {
        if cancel.load(Ordering::Relaxed) {
            res.stats.cancelled = true;
            break;
        }
        res.stats.files_considered += 1;
        if !matches_doc(shard, doc, &q)? {
            continue;
        }
        let fm = file_match(shard, doc, &q)?;
        fragments_seen += fm.match_count();
        res.stats.match_count += fm.match_count();
        res.files.push(fm);
        if opts
            .shard_max_match_count
            .is_some_and(|limit| fragments_seen >= limit)
        {
            break;
        }
    }
    res.stats.file_count = res.files.len();
    Ok(res)
}

/// Replace every repo-scoped node with the constant it takes for this shard.
/// Children are resolved first, so nested scopes see constants.
fn resolve_repo_scoped(shard: &IndexShard, q: &Query) -> Result<Query, ShardError> {
    Ok(match q {
        Query::Type {
            kind: TypeKind::Repo,
            child,
        } => {
            let child = simplify(&resolve_repo_scoped(shard, child)?);
            Query::Const(any_doc_matches(shard, &child)?)
        }
        Query::Type { kind, child } => Query::typed(*kind, resolve_repo_scoped(shard, child)?),
        Query::And(children) => Query::And(
            children
                .iter()
                .map(|c| resolve_repo_scoped(shard, c))
                .collect::<Result<_, _>>()?,
        ),
        Query::Or(children) => Query::Or(
            children
                .iter()
                .map(|c| resolve_repo_scoped(shard, c))
                .collect::<Result<_, _>>()?,
        ),
        Query::Not(child) => Query::not(resolve_repo_scoped(shard, child)?),
        leaf => leaf.clone(),
    })
}

fn any_doc_matches(shard: &IndexShard, q: &Query) -> Result<bool, ShardError> {
    if let Query::Const(v) = q {
        return Ok(*v);
    }
    match required_docs(shard, q) {
        Some(list) => {
            for doc in list {
                if matches_doc(shard, doc, q)? {
                    return Ok(true);
                }
            }
        }
        None => {
            for doc in 0..shard.doc_count() {
                if matches_doc(shard, doc, q)? {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

/// Sorted documents that can possibly match, or `None` for "all of them".
fn required_docs(shard: &IndexShard, q: &Query) -> Option<Vec<u32>> {
    use crate::shard::{intersect_sorted, union_sorted};
    match q {
        Query::Substring(s) if !s.file_name => shard.candidates(s.pattern.as_bytes()),
        Query::Const(false) => Some(Vec::new()),
        Query::And(children) => children
            .iter()
            .filter_map(|c| required_docs(shard, c))
            .reduce(|a, b| intersect_sorted(&a, &b)),
        Query::Or(children) => {
            let mut acc: Vec<u32> = Vec::new();
            for c in children {
                acc = union_sorted(&acc, &required_docs(shard, c)?);
            }
            Some(acc)
        }
        Query::Type {
            kind: TypeKind::FileMatch | TypeKind::FileName,
            child,
        } => required_docs(shard, child),
        _ => None,
    }
}

fn matches_doc(shard: &IndexShard, doc: u32, q: &Query) -> Result<bool, ShardError> {
    Ok(match q {
        Query::Substring(s) => {
            let hay = if s.file_name {
                shard.doc_name(doc).as_bytes()
            } else {
                shard.doc_content(doc)?
            };
            find(hay, s.pattern.as_bytes(), s.case_sensitive, 0).is_some()
        }
        Query::Regexp(r) => {
            let hay = if r.is_file_name() {
                shard.doc_name(doc).as_bytes()
            } else {
                shard.doc_content(doc)?
            };
            r.regex().is_match(hay)
        }
        Query::Repo(p) => shard.repository().name.contains(p.as_str()),
        Query::Const(v) => *v,
        Query::And(children) => {
            for c in children {
                if !matches_doc(shard, doc, c)? {
                    return Ok(false);
                }
            }
            true
        }
        Query::Or(children) => {
            for c in children {
                if matches_doc(shard, doc, c)? {
                    return Ok(true);
                }
            }
            false
        }
        Query::Not(child) => !matches_doc(shard, doc, child)?,
        Query::Type {
            kind: TypeKind::Repo,
            child,
        } => any_doc_matches(shard, child)?,
        Query::Type { child, .. } => matches_doc(shard, doc, child)?,
    })
}

/// Next occurrence of `needle` in `hay` at or after `from`.
fn find(hay: &[u8], needle: &[u8], case_sensitive: bool, from: usize) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() || from > hay.len() - needle.len() {
        return None;
    }
    hay[from..]
        .windows(needle.len())
        .position(|w| {
            if case_sensitive {
                w == needle
            } else {
                w.eq_ignore_ascii_case(needle)
            }
        })
        .map(|p| p + from)
}

#[derive(Default)]
struct Hits {
    /// (offset, length) inside the file name
    name: Vec<(usize, usize)>,
    /// (offset, length) inside the content
    content: Vec<(usize, usize)>,
}

/// Gather match positions from positive leaves. Negated sub-trees and
/// repo-scoped or name-only wrappers contribute nothing.
fn collect_hits(shard: &IndexShard, doc: u32, q: &Query, hits: &mut Hits) -> Result<(), ShardError> {
    match q {
        Query::Substring(s) => {
            let (hay, out) = if s.file_name {
                (shard.doc_name(doc).as_bytes(), &mut hits.name)
            } else {
                (shard.doc_content(doc)?, &mut hits.content)
            };
            let needle = s.pattern.as_bytes();
            let mut at = 0;
            while let Some(p) = find(hay, needle, s.case_sensitive, at) {
                out.push((p, needle.len()));
                at = p + needle.len();
            }
        }
        Query::Regexp(r) => {
            let (hay, out) = if r.is_file_name() {
                (shard.doc_name(doc).as_bytes(), &mut hits.name)
            } else {
                (shard.doc_content(doc)?, &mut hits.content)
            };
            out.extend(
                r.regex()
                    .find_iter(hay)
                    .filter(|m| !m.is_empty())
                    .map(|m| (m.start(), m.len())),
            );
        }
        Query::And(children) | Query::Or(children) => {
            for c in children {
                collect_hits(shard, doc, c, hits)?;
            }
        }
        Query::Type {
            kind: TypeKind::FileMatch,
            child,
        } => collect_hits(shard, doc, child, hits)?,
        _ => {}
    }
    Ok(())
}

fn file_match(shard: &IndexShard, doc: u32, q: &Query) -> Result<FileMatch, ShardError> {
    let mut hits = Hits::default();
    collect_hits(shard, doc, q, &mut hits)?;
    let name = shard.doc_name(doc);
    let mut line_matches = Vec::new();

    if !hits.name.is_empty() {
        hits.name.sort_unstable();
        hits.name.dedup_by_key(|h| h.0);
        line_matches.push(LineMatch {
            line: name.to_string(),
            line_start: 0,
            line_end: name.len() as u32,
            line_number: 0,
            file_name: true,
            fragments: hits
                .name
                .iter()
                .map(|&(off, len)| LineFragment {
                    line_offset: off as u32,
                    offset: off as u32,
                    match_length: len as u32,
                })
                .collect(),
        });
    }

    if !hits.content.is_empty() {
        let content = shard.doc_content(doc)?;
        hits.content.sort_unstable();
        hits.content.dedup_by_key(|h| h.0);
        let mut by_line: BTreeMap<u32, LineMatch> = BTreeMap::new();
        for (off, len) in hits.content {
            let (number, start, end) = line_of(content, off);
            let lm = by_line.entry(number).or_insert_with(|| LineMatch {
                line: String::from_utf8_lossy(&content[start..end]).into_owned(),
                line_start: start as u32,
                line_end: end as u32,
                line_number: number,
                file_name: false,
                fragments: Vec::new(),
            });
            lm.fragments.push(LineFragment {
                line_offset: (off - start) as u32,
                offset: off as u32,
                match_length: len as u32,
            });
        }
        line_matches.extend(by_line.into_values());
    }

    let branches = shard.doc_branches(doc);
    let version = shard
        .repository()
        .branches
        .iter()
        .find(|b| branches.contains(&b.name))
        .map(|b| b.version.clone());
    Ok(FileMatch {
        repository: shard.repository().name.clone(),
        file_name: name.to_string(),
        branches,
        version,
        line_matches,
    })
}

/// 1-based line number plus the byte range of the line holding `off`
/// (newline excluded).
fn line_of(content: &[u8], off: usize) -> (u32, usize, usize) {
    let before = &content[..off];
    let start = before.iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1);
    let end = content[off..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(content.len(), |p| off + p);
    let number = before.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
    (number, start, end)
}
