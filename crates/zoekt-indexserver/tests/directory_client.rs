use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Url;
use serde_json::{json, Value};
use std::time::Duration;
use zoekt_indexserver::{HttpRepoDirectory, RepoDirectory, ResolveError};

async fn list(Json(body): Json<Value>) -> impl IntoResponse {
    if body != json!({"Enabled": true}) {
        return (StatusCode::BAD_REQUEST, Json(json!([])));
    }
    (
        StatusCode::OK,
        Json(json!([{"URI": "github.com/foo/bar"}, {"URI": "github.com/foo/empty"}])),
    )
}

async fn git(Path(rest): Path<String>) -> (StatusCode, String) {
    match rest.as_str() {
        "github.com/foo/bar/resolve-revision/HEAD" => {
            (StatusCode::OK, "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef\n".into())
        }
        "github.com/foo/empty/resolve-revision/HEAD" => (StatusCode::NOT_FOUND, String::new()),
        "github.com/foo/blank/resolve-revision/HEAD" => (StatusCode::OK, "  \n".into()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
    }
}

async fn spawn(app: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

fn directory_app() -> Router {
    Router::new()
        .route("/.internal/repos/list", post(list))
        .route("/.internal/git/{*rest}", get(git))
}

#[tokio::test]
async fn lists_enabled_repositories() {
    let root = spawn(directory_app()).await;
    let d = HttpRepoDirectory::new(root, Duration::from_secs(5)).unwrap();
    assert_eq!(
        d.list_repos().await.unwrap(),
        vec!["github.com/foo/bar", "github.com/foo/empty"]
    );
}

#[tokio::test]
async fn resolve_maps_statuses() {
    let root = spawn(directory_app()).await;
    let d = HttpRepoDirectory::new(root, Duration::from_secs(5)).unwrap();

    assert_eq!(
        d.resolve_revision("github.com/foo/bar", "HEAD").await,
        Ok("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef".to_string())
    );
    assert_eq!(
        d.resolve_revision("github.com/foo/empty", "HEAD").await,
        Err(ResolveError::NotFound)
    );
    assert_eq!(
        d.resolve_revision("github.com/foo/blank", "HEAD").await,
        Err(ResolveError::EmptyRevision)
    );
    assert_eq!(
        d.resolve_revision("github.com/foo/other", "HEAD").await,
        Err(ResolveError::Status(500))
    );
}

#[tokio::test]
async fn non_200_listing_is_an_error() {
    let app = Router::new().route(
        "/.internal/repos/list",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
    );
    let root = spawn(app).await;
    let d = HttpRepoDirectory::new(root, Duration::from_secs(5)).unwrap();
    assert!(d.list_repos().await.is_err());
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    // Bind and drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let root = Url::parse(&format!("http://{}/", addr)).unwrap();
    let d = HttpRepoDirectory::new(root, Duration::from_secs(2)).unwrap();

    assert!(matches!(
        d.resolve_revision("github.com/foo/bar", "HEAD").await,
        Err(ResolveError::Transport(_))
    ));
    assert!(d.list_repos().await.is_err());
}
