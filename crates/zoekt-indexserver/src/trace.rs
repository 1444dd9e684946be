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

//! In-memory log of recent operations, rendered by `/debug/requests`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub at_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub id: u64,
    pub family: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    /// None while the operation is still running.
    pub elapsed_ms: Option<u64>,
    pub events: Vec<TraceEvent>,
    pub failed: bool,
}

#[derive(Clone)]
pub struct TraceLog {
    inner: Arc<Inner>,
}

struct Inner {
    capacity: usize,
    next_id: AtomicU64,
    traces: Mutex<VecDeque<Arc<Mutex<Trace>>>>,
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TraceLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
                traces: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Start a trace; it is visible immediately and completes when the guard drops.
    pub fn start(&self, family: &str, title: impl Into<String>) -> TraceGuard {
        let trace = Arc::new(Mutex::new(Trace {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            family: family.to_string(),
            title: title.into(),
            started_at: Utc::now(),
            elapsed_ms: None,
            events: Vec::new(),
            failed: false,
        }));
        {
            let mut traces = self.inner.traces.lock();
            if traces.len() == self.inner.capacity {
                traces.pop_front();
            }
            traces.push_back(trace.clone());
        }
        TraceGuard {
            trace,
            started: Instant::now(),
        }
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<Trace> {
        let traces = self.inner.traces.lock();
        traces.iter().rev().map(|t| t.lock().clone()).collect()
    }
}

pub struct TraceGuard {
    trace: Arc<Mutex<Trace>>,
    started: Instant,
}

impl TraceGuard {
    pub fn event(&self, message: impl Into<String>) {
        let at_ms = self.started.elapsed().as_millis() as u64;
        self.trace.lock().events.push(TraceEvent {
            at_ms,
            message: message.into(),
        });
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.event(message);
        self.trace.lock().failed = true;
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        self.trace.lock().elapsed_ms = Some(self.started.elapsed().as_millis() as u64);
    }
}
