//! API key middleware
//!
//! Protected routes require the `x-api-key` header to match the configured
//! secret. Failures short-circuit with `403` before any handler runs.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use shelf_common::api::API_KEY_HEADER;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// A header that is not valid visible ASCII is treated as a wrong key.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|value| value.to_str().unwrap_or_default().to_string());

    state.authenticator.verify(presented.as_deref()).await?;

    debug!(path = %request.uri().path(), "API key accepted");
    Ok(next.run(request).await)
}
