//! UI serving route

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../ui/index.html");

/// GET /
///
/// Serves the static index page
pub async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
