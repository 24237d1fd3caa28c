//! HTTP handlers for static asset serving.

use axum::{
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::static_assets;

/// Serve embedded admin console assets with SPA fallback.
#[instrument]
pub async fn serve_embedded_asset(uri: Uri) -> Response {
    let mut path = uri.path().trim_start_matches('/');

    // If path is empty or ends with /, serve index.html
    if path.is_empty() || path.ends_with('/') {
        path = "index.html";
    }

    if let Some(content) = static_assets::Assets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        // Vite hashed assets can be cached indefinitely; index.html and
        // everything else must revalidate
        let cache_control = if path.starts_with("assets/") {
            "public, max-age=31536000, immutable"
        } else {
            "no-cache"
        };

        let headers = [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, cache_control.to_string()),
        ];
        return (headers, content.data.into_owned()).into_response();
    }

    // Unknown paths get index.html so client-side routes survive deep links
    if let Some(index) = static_assets::Assets::get("index.html") {
        let headers = [
            (header::CONTENT_TYPE, "text/html".to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ];
        return (headers, index.data.into_owned()).into_response();
    }

    StatusCode::NOT_FOUND.into_response()
}
