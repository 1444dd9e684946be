mod common;

use std::sync::Arc;

use zoekt_rs::{
    DirectoryLoader, IndexShard, Query, QueryError, SearchOptions, ShardRegistry, ShardedSearcher,
};

#[tokio::test]
async fn invalid_query_is_rejected_before_dispatch() {
    let s = ShardedSearcher::new(
        common::registry(vec![("a", common::in_memory("a", &[("f", "x")]))]),
        1,
    );
    let err = s
        .search(
            &Query::and(vec![Query::substring("x"), Query::substring("")]),
            &SearchOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::EmptyPattern);
}

#[tokio::test]
async fn repo_filter_skips_other_shards() {
    let reg = common::registry(vec![
        ("1", common::in_memory("github.com/foo/bar-1", &[("a", "test")])),
        ("2", common::in_memory("github.com/foo/bar-2", &[("a", "test")])),
        ("3", common::in_memory("github.com/foo/baz", &[("a", "test")])),
    ]);
    let q = Query::and(vec![
        Query::substring("test"),
        Query::or(vec![
            Query::repo("github.com/foo/bar-1"),
            Query::repo("github.com/foo/bar-2"),
        ]),
    ]);
    let res = ShardedSearcher::new(reg, 2)
        .search(&q, &SearchOptions::default())
        .await
        .unwrap();
    let repos: Vec<&str> = res.files.iter().map(|f| f.repository.as_str()).collect();
    assert_eq!(repos, vec!["github.com/foo/bar-1", "github.com/foo/bar-2"]);
    assert_eq!(res.stats.shards_skipped, 1);
    assert_eq!(res.stats.shards_scanned, 2);
}

#[tokio::test]
async fn same_repository_under_two_keys_is_reported_once() {
    let files = [("main.go", "needle one\nneedle two")];
    let reg = common::registry(vec![
        ("old", common::in_memory("github.com/x/y", &files)),
        ("new", common::in_memory("github.com/x/y", &files)),
    ]);
    let res = ShardedSearcher::new(reg, 2)
        .search(&Query::substring("needle"), &SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.stats.match_count, 2);
    assert_eq!(res.stats.file_count, 1);
}

#[tokio::test]
async fn failing_shard_is_counted_and_others_still_answer() {
    let dir = tempfile::tempdir().unwrap();
    let good = common::write_shard(dir.path(), "good", &[("a", "needle")]);
    let bad = common::write_shard(dir.path(), "bad", &[("a", "needle")]);
    common::corrupt_first_doc(&bad);

    let reg = common::registry(vec![
        ("good", Arc::new(IndexShard::open(&good).unwrap())),
        ("bad", Arc::new(IndexShard::open(&bad).unwrap())),
    ]);
    let res = ShardedSearcher::new(reg, 2)
        .search(&Query::substring("needle"), &SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(res.files.len(), 1);
    assert_eq!(res.files[0].repository, "good");
    assert_eq!(res.stats.shard_errors, 1);
}

#[tokio::test]
async fn match_budget_stops_the_search() {
    let mut shards = Vec::new();
    let names: Vec<String> = (0..16).map(|i| format!("repo-{:02}", i)).collect();
    for n in &names {
        shards.push((n.as_str(), common::in_memory(n, &[("f", "hit hit hit")])));
    }
    let opts = SearchOptions {
        total_max_match_count: Some(3),
        ..Default::default()
    };
    let res = ShardedSearcher::new(common::registry(shards), 1)
        .search(&Query::substring("hit"), &opts)
        .await
        .unwrap();
    assert!(res.stats.cancelled);
    assert!(res.stats.match_count >= 3);
    assert!(res.files.len() < 16);
}

#[tokio::test]
async fn display_count_truncates_sorted_results() {
    let reg = common::registry(vec![
        ("b", common::in_memory("b", &[("2", "x1"), ("1", "x1")])),
        ("a", common::in_memory("a", &[("9", "x1")])),
    ]);
    let opts = SearchOptions {
        max_doc_display_count: Some(2),
        ..Default::default()
    };
    let res = ShardedSearcher::new(reg, 2)
        .search(&Query::substring("x1"), &opts)
        .await
        .unwrap();
    let got: Vec<(String, String)> = res
        .files
        .into_iter()
        .map(|f| (f.repository, f.file_name))
        .collect();
    assert_eq!(
        got,
        vec![
            ("a".to_string(), "9".to_string()),
            ("b".to_string(), "1".to_string())
        ]
    );
}

#[tokio::test]
async fn loader_tracks_directory_contents() {
    let dir = tempfile::tempdir().unwrap();
    let a = common::write_shard(dir.path(), "a", &[("f", "x needle")]);
    let b = common::write_shard(dir.path(), "b", &[("f", "x")]);
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let reg = Arc::new(ShardRegistry::new());
    let loader = DirectoryLoader::new(dir.path(), "*.zoekt", Arc::clone(&reg)).unwrap();
    let searcher = ShardedSearcher::new(Arc::clone(&reg), 2);
    let needle = Query::substring("needle");

    let r = loader.rescan().unwrap();
    assert_eq!((r.loaded, r.failed, r.removed), (2, 0, 0));
    assert_eq!(reg.len(), 2);

    let r = loader.rescan().unwrap();
    assert_eq!((r.loaded, r.unchanged), (0, 2));

    std::fs::remove_file(&b).unwrap();
    std::fs::write(dir.path().join("junk.zoekt"), b"not a shard").unwrap();
    let r = loader.rescan().unwrap();
    assert_eq!((r.removed, r.failed), (1, 1));
    assert_eq!(reg.keys(), vec![a.display().to_string()]);

    // A broken file renamed over the shard keeps the previous instance.
    let tmp = dir.path().join("a.tmp");
    std::fs::write(&tmp, b"garbage").unwrap();
    std::fs::rename(&tmp, &a).unwrap();
    let r = loader.rescan().unwrap();
    assert_eq!((r.failed, r.removed), (2, 0));
    let kept = reg.get(&a.display().to_string()).unwrap();
    assert_eq!(kept.repository().name, "a");
    let res = searcher.search(&needle, &SearchOptions::default()).await.unwrap();
    assert_eq!(res.files.len(), 1);

    // A broken rewrite in place drops the key; searching must not touch the old mapping.
    common::write_shard(dir.path(), "a", &[("f", "x needle")]);
    let r = loader.rescan().unwrap();
    assert_eq!(r.loaded, 1);
    std::fs::write(&a, b"garbage").unwrap();
    let r = loader.rescan().unwrap();
    assert_eq!((r.failed, r.removed), (2, 1));
    assert!(reg.get(&a.display().to_string()).is_none());
    let res = searcher.search(&needle, &SearchOptions::default()).await.unwrap();
    assert!(res.files.is_empty());

    // The next good write is picked up again.
    common::write_shard(dir.path(), "a", &[("f", "x needle")]);
    let r = loader.rescan().unwrap();
    assert_eq!(r.loaded, 1);
    let res = searcher.search(&needle, &SearchOptions::default()).await.unwrap();
    assert_eq!(res.files.len(), 1);
}

#[test]
fn loader_skips_shards_with_corrupt_headers() {
    let dir = tempfile::tempdir().unwrap();
    let good = common::write_shard(dir.path(), "good", &[("f", "x")]);
    let count = common::write_shard(dir.path(), "count", &[("f", "x")]);
    let offset = common::write_shard(dir.path(), "offset", &[("f", "x")]);

    let mut bytes = std::fs::read(&count).unwrap();
    bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(&count, bytes).unwrap();

    let mut bytes = std::fs::read(&offset).unwrap();
    bytes[28..36].copy_from_slice(&u64::MAX.to_le_bytes());
    std::fs::write(&offset, bytes).unwrap();

    std::fs::create_dir(dir.path().join("nested.zoekt")).unwrap();

    assert!(IndexShard::open(&count).is_err());
    assert!(IndexShard::open(&offset).is_err());

    let reg = Arc::new(ShardRegistry::new());
    let loader = DirectoryLoader::new(dir.path(), "*.zoekt", Arc::clone(&reg)).unwrap();
    let r = loader.rescan().unwrap();
    assert_eq!((r.loaded, r.failed), (1, 2));
    assert_eq!(reg.keys(), vec![good.display().to_string()]);
}
