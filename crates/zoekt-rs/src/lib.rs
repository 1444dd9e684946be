//! Zoekt-style code search core: shard format, query tree and the sharded
//! search engine used by `zoekt-indexserver` and the `zr-*` tools.

pub mod index;
pub mod query;
pub mod shard;
pub mod shards;
pub mod trigram;
pub mod types;

pub use crate::index::IndexBuilder;
pub use crate::query::{Query, QueryError, TypeKind};
pub use crate::shard::{read_repository, IndexShard, ShardError, ShardWriter};
pub use crate::shards::{DirectoryLoader, ShardRegistry, ShardedSearcher};
pub use crate::trigram::trigrams;
pub use crate::types::{
    Document, FileMatch, LineFragment, LineMatch, Repository, RepositoryBranch, SearchOptions,
    SearchResult, Stats,
};

/// Walk `root` and write one shard for `repo` to `out`.
pub fn index_directory(
    root: impl AsRef<std::path::Path>,
    repo: &Repository,
    out: impl AsRef<std::path::Path>,
) -> anyhow::Result<usize> {
    let docs = IndexBuilder::new(root.as_ref()).build()?;
    ShardWriter::new(out).write(repo, &docs)?;
    Ok(docs.len())
}
