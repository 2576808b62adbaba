use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{common::ErrorBody, server::AppState};

/// Rejects requests without the shared secret before any handler runs.
pub async fn check_auth(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let reason = match auth_header {
        Some(auth) if auth == state.config.server.password => return next.run(req).await,
        Some(_) => "Invalid authorization",
        None => "Missing Authorization header",
    };
    warn!("Control request to {} rejected: {}", req.uri().path(), reason);
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::new(401, reason, req.uri().path())),
    )
        .into_response()
}

pub async fn add_response_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        "Guildbeat-Version",
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}
