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

//! On-disk shard format.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header   magic u32 | version u32 | doc_count u32
//!          meta_off u64 | meta_len u64 | docs_off u64 | content_off u64
//! meta     JSON-encoded `Repository`
//! docs     per doc: name_len u16 | name | branch_mask u64 | off u64 | len u64
//! content  concatenated document bodies; doc offsets are relative to content_off
//! ```

use std::fmt;

pub const MAGIC: u32 = 0x5a4f_454b; // 'ZOEK'
pub const VERSION: u32 = 1;
pub const HEADER_LEN: usize = 4 + 4 + 4 + 8 * 4;
/// Suffix of every shard file name produced by this crate.
pub const SHARD_SUFFIX: &str = ".zoekt";

mod reader;
pub use reader::{read_repository, IndexShard};
pub(crate) use reader::{intersect_sorted, union_sorted};

mod writer;
pub use writer::{shard_file_name, ShardWriter};

/// Failure inside an already opened shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardError {
    Corrupt(String),
}

impl fmt::Display for ShardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardError::Corrupt(s) => write!(f, "corrupt shard: {}", s),
        }
    }
}

impl std::error::Error for ShardError {}
