//! Serves files from a directory with range support.
//!
//! ```text
//! cargo run --example serve -- ./media
//! curl -v -H 'Range: bytes=0-99,-100' http://127.0.0.1:3000/file?path=clip.mp4
//! ```

use std::path::{Component, Path, PathBuf};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::info;

use range_response::{guess_media_type, KnownSize, Ranged};

#[derive(Debug, Deserialize)]
struct FileRequest {
    path: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let root = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    info!(root = %root.display(), "serving files");

    let router = Router::new()
        .route("/file", get(get_file))
        .with_state(root);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    axum::serve(listener, router).await
}

async fn get_file(
    State(root): State<PathBuf>,
    headers: HeaderMap,
    Query(q): Query<FileRequest>,
) -> Response {
    let Some(path) = resolve(&root, &q.path) else {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    };

    let media_type = guess_media_type(&path);
    let body = KnownSize::open(&path).await.map_err(Into::into);
    Ranged::from_headers(&headers, body, media_type).into_response()
}

// keeps requests inside `root`
fn resolve(root: &Path, requested: &str) -> Option<PathBuf> {
    let requested = Path::new(requested);
    if requested.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(requested))
}
