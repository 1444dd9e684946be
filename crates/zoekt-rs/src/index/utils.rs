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

/// Heuristic: decide whether a byte buffer should be considered text.
pub fn is_text(buf: &[u8]) -> bool {
    if buf.contains(&0) {
        return false;
    }
    if buf.is_empty() {
        return true;
    }
    // A high fraction of control bytes in the head of the file means binary.
    let sample = &buf[..buf.len().min(4096)];
    let non_print = sample
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();
    (non_print as f64 / sample.len() as f64) < 0.30
}
