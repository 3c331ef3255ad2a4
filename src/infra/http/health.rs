use axum::http::StatusCode;

/// Liveness probe; never touches the browser.
pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
