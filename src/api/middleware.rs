//! API Middleware
//!
//! Builds the command context from request headers and logs requests.
//! Authentication happens upstream of this service.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::domain::CommandContext;

pub const ACTOR_HEADER: &str = "x-actor-id";
pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const SOURCE_HEADER: &str = "x-source";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build a [`CommandContext`] from request headers.
///
/// A malformed correlation id is rejected; a missing one is generated.
pub fn context_from_headers(headers: &HeaderMap) -> Result<CommandContext, String> {
    let mut context = CommandContext::new();

    if let Some(actor) = header_str(headers, ACTOR_HEADER) {
        context = context.with_actor(actor);
    }

    if let Some(source) = header_str(headers, SOURCE_HEADER) {
        context = context.with_source(source);
    }

    match header_str(headers, CORRELATION_HEADER) {
        Some(raw) => {
            let correlation_id = Uuid::parse_str(raw)
                .map_err(|_| format!("Invalid {CORRELATION_HEADER} header format"))?;
            context = context.with_correlation_id(correlation_id);
        }
        None => {
            context.ensure_correlation_id();
        }
    }

    Ok(context)
}

// =========================================================================
// Command Context Middleware
// =========================================================================

pub async fn context_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let context = context_from_headers(request.headers()).map_err(|message| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": message,
                "error_code": "invalid_header"
            })),
        )
            .into_response()
    })?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let context = request.extensions().get::<CommandContext>();
    let correlation_id = context.and_then(|ctx| ctx.correlation_id);
    let actor_id = context.and_then(|ctx| ctx.actor_id.clone());

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        actor_id = ?actor_id,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
