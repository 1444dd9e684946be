use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::types::Document;

use super::utils::is_text;

/// Walks a directory (honouring `.gitignore`) and reads the text files
/// below it as documents named by their slash-separated relative path.
pub struct IndexBuilder {
    root: PathBuf,
    exclude: Option<regex::Regex>,
    max_file_size: u64,
    follow_symlinks: bool,
    include_hidden: bool,
}

impl IndexBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: None,
            max_file_size: 1_000_000,
            follow_symlinks: false,
            include_hidden: false,
        }
    }

    pub fn max_file_size(mut self, sz: u64) -> Self {
        self.max_file_size = sz;
        self
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn exclude_regex(mut self, re: regex::Regex) -> Self {
        self.exclude = Some(re);
        self
    }

    /// Documents sorted by name. Oversized and binary files are skipped.
    pub fn build(&self) -> Result<Vec<Document>> {
        let mut builder = ignore::WalkBuilder::new(&self.root);
        builder.hidden(!self.include_hidden);
        builder.follow_links(self.follow_symlinks);
        builder.git_ignore(true);
        builder.require_git(false);

        let mut docs = Vec::new();
        let mut skipped = 0usize;
        for entry in builder.build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "walk error");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path());
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if self.exclude.as_ref().is_some_and(|re| re.is_match(&name)) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > self.max_file_size {
                skipped += 1;
                continue;
            }
            let content = std::fs::read(entry.path())
                .with_context(|| format!("read {}", entry.path().display()))?;
            if !is_text(&content) {
                skipped += 1;
                continue;
            }
            docs.push(Document::new(name, content));
        }
        docs.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!(
            root = %self.root.display(),
            docs = docs.len(),
            skipped,
            "collected documents"
        );
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_text_files_and_skips_binary_and_large() {
        let td = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(td.path().join("src")).unwrap();
        std::fs::write(td.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(td.path().join("README"), "hello").unwrap();
        std::fs::write(td.path().join("blob.bin"), [0u8, 1, 2]).unwrap();
        std::fs::write(td.path().join("big.txt"), "x".repeat(64)).unwrap();

        let docs = IndexBuilder::new(td.path()).max_file_size(32).build().unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["README", "src/main.rs"]);
    }

    #[test]
    fn exclude_regex_applies_to_relative_names() {
        let td = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(td.path().join("vendor")).unwrap();
        std::fs::write(td.path().join("vendor/x.go"), "package x").unwrap();
        std::fs::write(td.path().join("y.go"), "package y").unwrap();
        let docs = IndexBuilder::new(td.path())
            .exclude_regex(regex::Regex::new("^vendor/").unwrap())
            .build()
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "y.go");
    }
}
