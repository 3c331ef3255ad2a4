mod convert;
mod error;
mod health;
mod middleware;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use middleware::REQUEST_ID_HEADER;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::convert::ConversionService;

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub conversions: Arc<ConversionService>,
}

impl HttpState {
    pub fn new(conversions: Arc<ConversionService>) -> Self {
        Self { conversions }
    }
}

/// Build the service router. `upload_body_limit` caps the multipart request size in bytes.
pub fn build_router(state: HttpState, upload_body_limit: usize) -> Router {
    Router::new()
        .route(
            "/generate/pdf",
            post(convert::generate_pdf).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/health", get(health::health))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}
