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

use std::fs::File;
use std::io::Write;
use tempfile::tempdir;
use zoekt_rs::{index_directory, IndexBuilder, IndexShard, Repository};

fn names(b: IndexBuilder) -> Vec<String> {
    b.build().unwrap().into_iter().map(|d| d.name).collect()
}

#[test]
fn gitignore_size_binary_hidden_and_symlink() {
    let dir = tempdir().unwrap();
    let root = dir.path();

    let mut f = File::create(root.join("foo.txt")).unwrap();
    writeln!(f, "hello world zoekt example").unwrap();

    let mut b = File::create(root.join("data.bin")).unwrap();
    b.write_all(&[0, 1, 2, 3, 4, 0]).unwrap();

    let mut large = File::create(root.join("big.txt")).unwrap();
    large.write_all(&vec![b'a'; 1024 * 1024 + 10]).unwrap();

    let mut gi = File::create(root.join(".gitignore")).unwrap();
    writeln!(gi, "ignored.txt").unwrap();
    let mut ign = File::create(root.join("ignored.txt")).unwrap();
    writeln!(ign, "this should be ignored").unwrap();

    let mut hidden = File::create(root.join(".secret")).unwrap();
    writeln!(hidden, "hidden stuff zoekt").unwrap();

    #[cfg(unix)]
    std::os::unix::fs::symlink(root.join("foo.txt"), root.join("link_to_foo")).unwrap();

    assert_eq!(names(IndexBuilder::new(root)), vec!["foo.txt"]);

    let with_hidden = names(IndexBuilder::new(root).include_hidden(true));
    assert!(with_hidden.contains(&".secret".to_string()));
    assert!(with_hidden.contains(&".gitignore".to_string()));
    assert!(!with_hidden.contains(&"ignored.txt".to_string()));

    #[cfg(unix)]
    {
        let followed = names(IndexBuilder::new(root).follow_symlinks(true));
        assert_eq!(followed, vec!["foo.txt", "link_to_foo"]);
    }

    let bigger = names(IndexBuilder::new(root).max_file_size(2 * 1024 * 1024));
    assert!(bigger.contains(&"big.txt".to_string()));
}

#[test]
fn index_directory_writes_a_loadable_shard() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/lib.rs"), "pub fn answer() -> u32 { 42 }\n").unwrap();
    std::fs::write(dir.path().join("README.md"), "# demo\n").unwrap();

    let out = tempdir().unwrap();
    let path = out.path().join("demo_v1.00000.zoekt");
    let repo = Repository::new("github.com/x/demo").with_branch("HEAD", "abc");
    assert_eq!(index_directory(dir.path(), &repo, &path).unwrap(), 2);

    let shard = IndexShard::open(&path).unwrap();
    assert_eq!(shard.repository(), &repo);
    assert_eq!(shard.doc_count(), 2);
    assert_eq!(shard.doc_name(1), "src/lib.rs");
}
