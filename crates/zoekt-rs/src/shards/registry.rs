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

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::shard::IndexShard;

/// Immutable view of the registry at one point in time.
pub type Snapshot = Arc<BTreeMap<String, Arc<IndexShard>>>;

/// Key -> shard map. Readers take a snapshot and never block writers for
/// longer than an `Arc` clone; writers are serialized and publish a fresh map.
#[derive(Default)]
pub struct ShardRegistry {
    shards: RwLock<Snapshot>,
    write: Mutex<()>,
}

impl ShardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shards.read().clone()
    }

    /// Install `shard` under `key`, handing back the instance it displaced.
    pub fn replace(&self, key: impl Into<String>, shard: Arc<IndexShard>) -> Option<Arc<IndexShard>> {
        let key = key.into();
        let _w = self.write.lock();
        let mut next = (*self.snapshot()).clone();
        let old = next.insert(key.clone(), shard);
        *self.shards.write() = Arc::new(next);
        tracing::debug!(key = %key, replaced = old.is_some(), "shard installed");
        old
    }

    pub fn remove(&self, key: &str) -> Option<Arc<IndexShard>> {
        let _w = self.write.lock();
        let current = self.snapshot();
        if !current.contains_key(key) {
            return None;
        }
        let mut next = (*current).clone();
        let old = next.remove(key);
        *self.shards.write() = Arc::new(next);
        tracing::debug!(key = %key, "shard removed");
        old
    }

    pub fn get(&self, key: &str) -> Option<Arc<IndexShard>> {
        self.shards.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.shards.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shards.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
