//! Embedding daemon HTTP service.
//!
//! A small loopback API fronting the in-process embedding model:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness probe: `{"status":"ok"}` |
//! | `POST` | `/embed` | `{"text": …}` → `{"vector": [...]}` |
//! | `POST` | `/shutdown` | Graceful stop, used by `daemon stop` |
//!
//! Error contract: 400 with `{"error":{"code":"bad_request","message":…}}`
//! when `text` is missing or empty, 500 with code `internal` otherwise.
//! CORS is wide open: the read-side exploration tools are browser-based.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::hash_embed;

struct AppState {
    dims: usize,
    shutdown: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

/// Serve until `/shutdown` is called or the task is aborted.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let addr = bind_address(&config.embedding.base_url);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let state = Arc::new(AppState {
        dims: config.embedding.dims,
        shutdown: Mutex::new(Some(tx)),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/embed", post(embed))
        .route("/shutdown", post(shutdown))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("✅ embedding daemon listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            rx.await.ok();
        })
        .await?;

    println!("✅ embedding daemon stopped");
    Ok(())
}

/// `http://127.0.0.1:8632` → `127.0.0.1:8632`.
pub fn bind_address(base_url: &str) -> String {
    base_url
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_end_matches('/')
        .to_string()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct EmbedRequest {
    #[serde(default)]
    text: Option<String>,
}

async fn embed(State(state): State<Arc<AppState>>, body: Option<Json<EmbedRequest>>) -> Response {
    let text = body.and_then(|Json(req)| req.text);
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "text is required");
    };

    let vector = hash_embed(&text, state.dims);
    Json(json!({ "vector": vector })).into_response()
}

async fn shutdown(State(state): State<Arc<AppState>>) -> Response {
    match state.shutdown.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(());
            Json(json!({ "status": "stopping" })).into_response()
        }
        None => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "shutdown already requested",
        ),
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}
