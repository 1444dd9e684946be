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

//! Serving side: the registry of loaded shards, the loader that keeps it in
//! sync with an index directory, and the searcher that fans a query out.

mod eval;
mod loader;
mod merge;
mod registry;
mod searcher;

pub use eval::search_shard;
pub use loader::{DirectoryLoader, LoadReport};
pub use registry::{ShardRegistry, Snapshot};
pub use searcher::ShardedSearcher;
