//! HTTP routes for the unotebook server.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use unotebook_core::{
    CellEngine, NEW_NOTEBOOK_NAME, NOTEBOOK_SUFFIX, NotebookDocument, NotebookId, RhaiEvaluator,
    VERSION, sanitize_filename,
};

use crate::channel::HttpChannel;
use crate::error::{ServerError, ServerResult};
use crate::vfs::Vfs;

/// UI script asset name.
pub const SCRIPT_ASSET: &str = "unotebook.js";

/// Precompressed UI script asset name, served in preference.
pub const SCRIPT_ASSET_GZ: &str = "unotebook.js.gz";

const INDEX_HTML: &str = r#"
<!doctype html>
<meta charset="utf-8">
<title>µNotebook</title>
<body style='background-color: #f4f0e8; font-family: system-ui, "Segoe UI", Roboto, Oxygen, Ubuntu, Cantarell, "Fira Sans", "Droid Sans", "Helvetica Neue", sans-serif;' id="app">Loading...</body>
<style>
  body {
    font-size: 16px;
    line-height: 1.65;
  }
  .output {
    padding: 8px;
    display: block;
  }
</style>
<script type="module" src="/unotebook.js"></script>
"#;

/// Application state shared across handlers.
pub struct AppState {
    /// Cell engine and its environment registry.
    pub engine: Arc<CellEngine<RhaiEvaluator>>,
    /// Persisted notebook documents.
    pub store: Arc<dyn Vfs>,
    /// UI assets.
    pub assets: Arc<dyn Vfs>,
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/notebook/{*rest}", get(index_handler))
        .route("/unotebook.js", get(script_handler))
        .route("/_delete", post(delete_handler))
        .route("/_stop", post(stop_handler))
        .route("/run_cell", post(run_cell_handler))
        .route("/_save/{name}", post(save_handler))
        .route("/_files", get(files_handler))
        .route("/_notebook/{name}", get(notebook_handler))
        .fallback(not_found_handler)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_request))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    tracing::info!("{} {}", request.method(), request.uri());
    next.run(request).await
}

async fn not_found_handler() -> ServerError {
    ServerError::NotFound("route".to_string())
}

/// UI shell, for the root and every `/notebook/...` deep link.
async fn index_handler() -> Html<String> {
    Html(format!(
        "<script>window.__unotebook_version__ = '{}'</script>{}",
        VERSION, INDEX_HTML
    ))
}

/// UI script, gzip variant preferred.
async fn script_handler(State(state): State<Arc<AppState>>) -> ServerResult<Response> {
    let javascript = (header::CONTENT_TYPE, "text/javascript");

    if state.assets.exists(SCRIPT_ASSET_GZ) {
        let data = state
            .assets
            .read(SCRIPT_ASSET_GZ)
            .map_err(|e| ServerError::io(SCRIPT_ASSET_GZ, e))?;
        return Ok((
            [javascript, (header::CONTENT_ENCODING, "gzip")],
            data,
        )
            .into_response());
    }

    let data = state
        .assets
        .read(SCRIPT_ASSET)
        .map_err(|e| ServerError::io(SCRIPT_ASSET, e))?;
    Ok(([javascript], data).into_response())
}

/// Parse a JSON string body naming a notebook.
fn notebook_name(body: &[u8]) -> ServerResult<NotebookId> {
    let name: String = serde_json::from_slice(body)?;
    Ok(NotebookId::new(name)?)
}

/// Delete a persisted document.
async fn delete_handler(State(state): State<Arc<AppState>>, body: Bytes) -> ServerResult<StatusCode> {
    let id = notebook_name(&body)?;
    let name = sanitize_filename(id.as_str());
    state
        .store
        .remove(&name)
        .map_err(|e| ServerError::io(&name, e))?;
    tracing::info!("Deleted {}", name);
    Ok(StatusCode::OK)
}

/// Discard a notebook's live environment.
async fn stop_handler(State(state): State<Arc<AppState>>, body: Bytes) -> ServerResult<StatusCode> {
    let id = notebook_name(&body)?;
    if state.engine.stop(id.as_str()) {
        tracing::info!("Stopped {}", id);
    }
    Ok(StatusCode::OK)
}

/// Body of `POST /run_cell`.
#[derive(Debug, Deserialize)]
pub struct RunCellRequest {
    #[serde(rename = "fn")]
    pub name: String,
    #[serde(default)]
    pub source: Vec<String>,
}

/// Run a cell, streaming its output as the response body.
///
/// The status is decided by the first event from the run: a failure before
/// any output is a plain 500, anything else commits a 200 and streams.
async fn run_cell_handler(State(state): State<Arc<AppState>>, body: Bytes) -> ServerResult<Response> {
    let request: RunCellRequest = serde_json::from_slice(&body)?;
    let id = NotebookId::new(request.name)?;
    let source = request.source.join("\n");
    tracing::debug!("run_cell {}: {:?}", id, source);

    let (mut channel, mut rx) = HttpChannel::new();
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = engine.run(&id, &source, &mut channel) {
            tracing::error!("Cell of {} failed: {}", id, e);
            channel.fail(e.into());
        }
    });

    let first = match rx.recv().await {
        Some(Err(e)) => return Err(e),
        first => first,
    };
    let rest = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    let stream = futures::stream::iter(first).chain(rest);

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Store the raw body as a document.
async fn save_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let name = sanitize_filename(&name);
    let id = NotebookId::new(name)?;
    if !headers.contains_key(header::CONTENT_LENGTH) {
        return Err(ServerError::MissingContentLength);
    }

    state
        .store
        .write(id.as_str(), &body)
        .map_err(|e| ServerError::io(id.as_str(), e))?;
    tracing::info!("Saved {} ({} bytes)", id, body.len());
    Ok(StatusCode::OK)
}

/// Entry of the `/_files` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "fn")]
    pub name: String,
    pub running: bool,
    pub size: u64,
}

/// List persisted documents.
async fn files_handler(State(state): State<Arc<AppState>>) -> ServerResult<Json<Vec<FileEntry>>> {
    let mut files = Vec::new();
    for name in state.store.list()? {
        if !name.ends_with(NOTEBOOK_SUFFIX) {
            continue;
        }
        let size = state.store.size(&name).map_err(|e| ServerError::io(&name, e))?;
        files.push(FileEntry {
            running: state.engine.is_running(&name),
            name,
            size,
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(files))
}

/// Load a document, or the blank template for the reserved new name.
async fn notebook_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    if !name.ends_with(NOTEBOOK_SUFFIX) {
        return Err(ServerError::NotFound(name));
    }
    let name = sanitize_filename(&name);

    let data = if name == NEW_NOTEBOOK_NAME {
        serde_json::to_vec(&NotebookDocument::blank())?
    } else {
        state.store.read(&name).map_err(|e| ServerError::io(&name, e))?
    };
    Ok(([(header::CONTENT_TYPE, "application/json")], data).into_response())
}
