use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use zoekt_indexserver::http;
use zoekt_indexserver::test_utils::{init_test_logging, FakeBuilder, FakeDirectory};
use zoekt_indexserver::{Scheduler, SchedulerConfig};

struct Server {
    base: String,
    scheduler: Arc<Scheduler>,
    builder: Arc<FakeBuilder>,
    _shutdown: watch::Sender<bool>,
    _dir: tempfile::TempDir,
}

async fn start(repos: &[&str]) -> Server {
    init_test_logging();
    let td = tempfile::tempdir().unwrap();
    let builder = Arc::new(FakeBuilder::new());
    let cfg = SchedulerConfig {
        index_dir: td.path().to_path_buf(),
        interval: Duration::from_secs(600),
        cpu_count: 1,
        shard_glob: "*.zoekt".into(),
        debug: false,
    };
    let scheduler = Arc::new(
        Scheduler::new(cfg, Arc::new(FakeDirectory::new(repos)), builder.clone()).unwrap(),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = watch::channel(false);
    tokio::spawn(http::serve(listener, http::router(Arc::clone(&scheduler)), rx));
    Server {
        base: format!("http://{}", addr),
        scheduler,
        builder,
        _shutdown: tx,
        _dir: td,
    }
}

#[tokio::test]
async fn page_lists_repositories_after_a_cycle() {
    let srv = start(&["github.com/a/one", "github.com/a/two"]).await;
    srv.scheduler.run_cycle().await.unwrap();

    let body = reqwest::get(format!("{}/", srv.base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("github.com/a/one"));
    assert!(body.contains("github.com/a/two"));
    assert!(body.contains("/debug/requests"));
}

#[tokio::test]
async fn manual_trigger_reports_outcome() {
    let srv = start(&["github.com/a/one"]).await;
    srv.builder.fail_for("github.com/a/broken");
    let client = reqwest::Client::new();

    let ok = client
        .post(format!("{}/", srv.base))
        .form(&[("repo", "github.com/a/one")])
        .send()
        .await
        .unwrap();
    assert!(ok.status().is_success());
    assert!(ok.text().await.unwrap().contains("Indexed github.com/a/one"));

    let bad = client
        .post(format!("{}/", srv.base))
        .form(&[("repo", "github.com/a/broken")])
        .send()
        .await
        .unwrap();
    assert!(bad
        .text()
        .await
        .unwrap()
        .contains("Indexing github.com/a/broken failed"));
    assert_eq!(srv.builder.requests().len(), 2);

    let empty = client
        .post(format!("{}/", srv.base))
        .form(&[("repo", " ")])
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn traces_as_html_or_json() {
    let srv = start(&["github.com/a/one"]).await;
    srv.scheduler.index("github.com/a/one").await.unwrap();
    let client = reqwest::Client::new();

    let html = client
        .get(format!("{}/debug/requests", srv.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("<table>"));

    let traces: serde_json::Value = client
        .get(format!("{}/debug/requests", srv.base))
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let first = &traces.as_array().unwrap()[0];
    assert_eq!(first["family"], "index");
    assert_eq!(first["title"], "github.com/a/one");
    assert_eq!(first["failed"], false);
}

#[tokio::test]
async fn health_is_ok() {
    let srv = start(&[]).await;
    let v: serde_json::Value = reqwest::get(format!("{}/health", srv.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(v["status"], "ok");
}
