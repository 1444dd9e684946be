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

//! Trigram extraction used for the per-shard candidate prefilter.
//!
//! Only ASCII word bytes take part; everything else resets the window. Any
//! word-byte run inside a pattern is therefore also a run inside every
//! document containing the pattern, so the prefilter never drops a match.

/// Lowercased trigrams of `hay`, in order, duplicates included.
pub fn trigrams(hay: &[u8]) -> impl Iterator<Item = [u8; 3]> + '_ {
    TrigramIter {
        bytes: hay,
        i: 0,
        w: [0; 3],
        n: 0,
    }
}

struct TrigramIter<'a> {
    bytes: &'a [u8],
    i: usize,
    w: [u8; 3],
    n: usize,
}

impl Iterator for TrigramIter<'_> {
    type Item = [u8; 3];
    fn next(&mut self) -> Option<Self::Item> {
        while self.i < self.bytes.len() {
            let b = self.bytes[self.i].to_ascii_lowercase();
            self.i += 1;
            let is_word = b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_';
            if !is_word {
                self.n = 0;
                continue;
            }
            if self.n < 3 {
                self.w[self.n] = b;
                self.n += 1;
                if self.n < 3 {
                    continue;
                }
            } else {
                self.w = [self.w[1], self.w[2], b];
            }
            return Some(self.w);
        }
        None
    }
}
