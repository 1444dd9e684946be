//! Keeps a local directory of zoekt shards in sync with the repositories a
//! remote directory service reports as enabled.
//!
//! - `scheduler` drives the periodic list -> resolve -> build -> collect cycle
//! - `directory` and `builder` are the two outside seams, both behind traits
//!   so tests can plug in fakes
//! - `collector` deletes shards whose repository is no longer listed
//! - `http` exposes the manual reindex page and recent operation traces
//!
//! The builder program must write shards in the `zoekt_rs` format. The
//! collector identifies a shard's repository with `zoekt_rs::read_repository`,
//! so shards in any other format (for example those of the upstream Go
//! `zoekt-archive-index`) are never recognized and never collected.

pub mod builder;
pub mod collector;
pub mod config;
pub mod directory;
pub mod http;
pub mod scheduler;
pub mod test_utils;
pub mod trace;
pub mod web_utils;

pub use builder::{ArchiveIndexCommand, BuildError, BuildOutput, BuildRequest, BuildSource, ShardBuilder};
pub use collector::{CollectReport, StaleShardCollector};
pub use config::{load_config, IndexServerConfig, MergeOpts};
pub use directory::{HttpRepoDirectory, RepoDirectory, ResolveError};
pub use scheduler::{cpu_count, CycleReport, IndexOutcome, Scheduler, SchedulerConfig};
pub use trace::{Trace, TraceGuard, TraceLog};
