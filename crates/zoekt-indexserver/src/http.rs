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

//! Operator page: manual reindex of a single repository and recent traces.

use anyhow::{Context, Result};
use axum::extract::Form;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::scheduler::Scheduler;
use crate::web_utils::{escape, wants_json};

#[derive(Clone)]
struct AppState {
    scheduler: Arc<Scheduler>,
}

#[derive(Deserialize)]
struct IndexForm {
    repo: String,
}

pub fn router(scheduler: Arc<Scheduler>) -> Router {
    Router::new()
        .route("/", get(index_page).post(index_repo))
        .route("/debug/requests", get(debug_requests))
        .route("/health", get(health))
        .layer(Extension(AppState { scheduler }))
}

/// Serve `app` on `listener` until `shutdown` changes.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr = listener.local_addr().context("listener address")?;
    tracing::info!(%addr, "http: listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .context("http server")
}

fn render_page(repos: &[String], msg: &str) -> String {
    let mut rows = String::new();
    for name in repos {
        let safe = escape(name);
        rows.push_str(&format!(
            "<li><form method=post action=\"/\"><input type=hidden name=repo value=\"{}\"><input type=submit value=\"{}\"></form></li>\n",
            safe, safe
        ));
    }
    format!(
        "<html><head><title>zoekt-indexserver</title></head><body>\n\
<a href=\"/debug/requests\">Traces</a>\n\
<p>{}</p>\n\
<p>Reindex:</p>\n<ul>\n{}</ul>\n\
</body></html>\n",
        escape(msg),
        rows
    )
}

async fn index_page(state: Extension<AppState>) -> Html<String> {
    Html(render_page(&state.scheduler.repos(), ""))
}

async fn index_repo(state: Extension<AppState>, Form(form): Form<IndexForm>) -> Response {
    let repo = form.repo.trim().to_string();
    if repo.is_empty() {
        return (StatusCode::BAD_REQUEST, Html("<h1>Bad Request</h1>".to_string())).into_response();
    }
    tracing::info!(repo = %repo, "http: manual reindex");
    let msg = match state.scheduler.index(&repo).await {
        Ok(_) => format!("Indexed {}", repo),
        Err(e) => format!("Indexing {} failed: {:#}", repo, e),
    };
    Html(render_page(&state.scheduler.repos(), &msg)).into_response()
}

async fn debug_requests(state: Extension<AppState>, headers: HeaderMap) -> Response {
    let traces = state.scheduler.traces().recent();
    if wants_json(&headers) {
        return Json(traces).into_response();
    }
    let mut rows = String::new();
    for t in &traces {
        let elapsed = t
            .elapsed_ms
            .map(|ms| format!("{} ms", ms))
            .unwrap_or_else(|| "running".to_string());
        let events: Vec<String> = t
            .events
            .iter()
            .map(|e| format!("{} ms: {}", e.at_ms, escape(&e.message)))
            .collect();
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&t.family),
            escape(&t.title),
            t.started_at.to_rfc3339(),
            elapsed,
            if t.failed { "failed" } else { "ok" },
            events.join("<br>")
        ));
    }
    Html(format!(
        "<html><head><title>traces</title></head><body>\n\
<table><tr><th>family</th><th>title</th><th>started</th><th>elapsed</th><th>status</th><th>events</th></tr>\n{}</table>\n\
</body></html>\n",
        rows
    ))
    .into_response()
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
