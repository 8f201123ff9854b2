// src/handlers/output.rs
//! Serves generated ad images referenced as `/outputs/<file>` in job results

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use crate::AppState;

pub fn output_routes() -> Router {
    Router::new().route("/outputs/:file_name", get(serve_output))
}

/// Only plain file names inside the output directory; no traversal
fn resolve_file_path(output_dir: &str, file_name: &str) -> Option<PathBuf> {
    let valid = !file_name.is_empty()
        && file_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !file_name.starts_with('.');
    valid.then(|| FsPath::new(output_dir).join(file_name))
}

fn get_content_type(path: &FsPath) -> &'static str {
    match path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

async fn serve_output(
    Path(file_name): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Response, StatusCode> {
    let file_path = resolve_file_path(&state.config.output_dir, &file_name).ok_or(StatusCode::NOT_FOUND)?;

    let bytes = match tokio::fs::read(&file_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to read output file {}: {}", file_path.display(), e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, get_content_type(&file_path))
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(axum::body::Body::from(bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
