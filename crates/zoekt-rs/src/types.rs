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

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A branch of a repository together with the commit it was indexed at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RepositoryBranch {
    pub name: String,
    pub version: String,
}

/// Repository metadata embedded in every shard file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub branches: Vec<RepositoryBranch>,
    #[serde(default)]
    pub commit_url_template: Option<String>,
    #[serde(default)]
    pub file_url_template: Option<String>,
    #[serde(default)]
    pub line_fragment_template: Option<String>,
}

impl Repository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Convenience for the common single-branch case.
    pub fn with_branch(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.branches.push(RepositoryBranch {
            name: name.into(),
            version: version.into(),
        });
        self
    }
}

/// A single file handed to the shard writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub content: Vec<u8>,
    /// Branches this document is present in. Empty means every branch of the repository.
    pub branches: Vec<String>,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            branches: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineFragment {
    /// byte offset of the match within the line
    pub line_offset: u32,
    /// byte offset of the match within the file (or file name for name matches)
    pub offset: u32,
    pub match_length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineMatch {
    pub line: String,
    pub line_start: u32,
    pub line_end: u32,
    /// 1-based; 0 for file name matches
    pub line_number: u32,
    pub file_name: bool,
    pub fragments: Vec<LineFragment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMatch {
    pub repository: String,
    pub file_name: String,
    pub branches: Vec<String>,
    /// Commit of the first branch carrying the file, when known.
    pub version: Option<String>,
    pub line_matches: Vec<LineMatch>,
}

impl FileMatch {
    pub fn match_count(&self) -> usize {
        self.line_matches.iter().map(|l| l.fragments.len()).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub shards_scanned: usize,
    pub shards_skipped: usize,
    pub shard_errors: usize,
    pub files_considered: usize,
    pub file_count: usize,
    pub match_count: usize,
    /// Set when the search stopped early (match budget or wall time).
    pub cancelled: bool,
    pub duration: Duration,
}

impl Stats {
    pub fn add(&mut self, other: &Stats) {
        self.shards_scanned += other.shards_scanned;
        self.shards_skipped += other.shards_skipped;
        self.shard_errors += other.shard_errors;
        self.files_considered += other.files_considered;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub files: Vec<FileMatch>,
    pub stats: Stats,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Stop evaluating a single shard after this many matching fragments.
    pub shard_max_match_count: Option<usize>,
    /// Stop the whole search once this many (deduplicated) fragments were collected.
    pub total_max_match_count: Option<usize>,
    /// Truncate the final file list.
    pub max_doc_display_count: Option<usize>,
    pub max_wall_time: Option<Duration>,
}
