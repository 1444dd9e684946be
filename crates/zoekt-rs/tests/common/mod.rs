#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use zoekt_rs::shard::shard_file_name;
use zoekt_rs::{Document, IndexShard, Repository, ShardRegistry, ShardWriter};

pub fn repo(name: &str) -> Repository {
    Repository::new(name).with_branch("HEAD", "0123456789abcdef0123456789abcdef01234567")
}

pub fn docs(files: &[(&str, &str)]) -> Vec<Document> {
    files
        .iter()
        .map(|(name, content)| Document::new(*name, *content))
        .collect()
}

/// Write a shard for `name` into `dir` and return its path.
pub fn write_shard(dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(shard_file_name(name));
    ShardWriter::new(&path)
        .write(&repo(name), &docs(files))
        .expect("write shard");
    path
}

pub fn in_memory(name: &str, files: &[(&str, &str)]) -> Arc<IndexShard> {
    Arc::new(IndexShard::from_documents(repo(name), docs(files)).expect("build shard"))
}

pub fn registry(shards: Vec<(&str, Arc<IndexShard>)>) -> Arc<ShardRegistry> {
    let reg = Arc::new(ShardRegistry::new());
    for (key, shard) in shards {
        reg.replace(key, shard);
    }
    reg
}

/// Point the first document's content length past the end of the file.
pub fn corrupt_first_doc(path: &Path) {
    let mut bytes = std::fs::read(path).expect("read shard");
    let docs_off = u64::from_le_bytes(bytes[28..36].try_into().unwrap()) as usize;
    let name_len = u16::from_le_bytes(bytes[docs_off..docs_off + 2].try_into().unwrap()) as usize;
    let len_at = docs_off + 2 + name_len + 16;
    bytes[len_at..len_at + 8].copy_from_slice(&(1u64 << 40).to_le_bytes());
    std::fs::write(path, bytes).expect("write shard");
}
