//! Router construction.

use std::path::Path;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::headers;

/// Page served with a 404 status for missing paths, when the site has one.
const NOT_FOUND_PAGE: &str = "404.html";

/// Create a router serving `root`.
///
/// Directory requests resolve to the directory's `index.html`.
pub(crate) fn create_router(root: &Path) -> Router {
    let files = ServeDir::new(root)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(root.join(NOT_FOUND_PAGE)));

    Router::new().fallback_service(files).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(headers::no_cache_layer())
            .layer(headers::content_type_options_layer()),
    )
}
