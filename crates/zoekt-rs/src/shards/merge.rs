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

use std::collections::BTreeMap;

use crate::types::{FileMatch, LineMatch};

/// Identity of a file across shards: the same repository, path and branch
/// set loaded twice (e.g. old and new shard during a swap) is one result.
type FileKey = (String, String, Vec<String>);

/// Accumulates per-shard results, dropping duplicate files and fragments.
#[derive(Default)]
pub(crate) struct Merger {
    files: BTreeMap<FileKey, FileMatch>,
    match_count: usize,
}

impl Merger {
    pub(crate) fn add(&mut self, files: Vec<FileMatch>) {
        for fm in files {
            let mut branches = fm.branches.clone();
            branches.sort();
            let key = (fm.repository.clone(), fm.file_name.clone(), branches);
            match self.files.get_mut(&key) {
                Some(existing) => {
                    for lm in fm.line_matches {
                        self.match_count += merge_line(&mut existing.line_matches, lm);
                    }
                }
                None => {
                    self.match_count += fm.match_count();
                    self.files.insert(key, fm);
                }
            }
        }
    }

    pub(crate) fn match_count(&self) -> usize {
        self.match_count
    }

    /// Files ordered by repository then path.
    pub(crate) fn finish(self) -> Vec<FileMatch> {
        self.files.into_values().collect()
    }
}

/// Fold `lm` into `lines`; returns how many fragments were new.
fn merge_line(lines: &mut Vec<LineMatch>, lm: LineMatch) -> usize {
    let Some(existing) = lines
        .iter_mut()
        .find(|l| l.file_name == lm.file_name && l.line_number == lm.line_number)
    else {
        let added = lm.fragments.len();
        let pos = lines
            .iter()
            .position(|l| (!l.file_name, l.line_number) > (!lm.file_name, lm.line_number))
            .unwrap_or(lines.len());
        lines.insert(pos, lm);
        return added;
    };
    let mut added = 0;
    for frag in lm.fragments {
        if existing.fragments.iter().all(|f| f.offset != frag.offset) {
            existing.fragments.push(frag);
            added += 1;
        }
    }
    existing.fragments.sort_by_key(|f| f.offset);
    added
}
