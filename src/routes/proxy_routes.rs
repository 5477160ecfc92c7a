use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::auth::bearer_token;
use crate::errors::AppError;
use crate::models::ProxyErrorBody;
use crate::service::proxy_service::{ProxyRequestBody, ProxyService};

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST `/api/coach` — authenticated relay to the dialog runtime
pub async fn coach_handler(
    State(svc): State<ProxyService>,
    headers: HeaderMap,
    body: Result<Json<ProxyRequestBody>, JsonRejection>,
) -> Response {
    let token = match bearer_token(&headers) {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };

    // An unreadable body is reported like missing fields, after auth.
    let (body, rejection) = match body {
        Ok(Json(b)) => (b, None),
        Err(r) => (ProxyRequestBody::default(), Some(r.body_text())),
    };

    match svc.relay(token, body).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => match (e, rejection) {
            (e, Some(reason)) if e.is_validation() => {
                error_response(&AppError::InvalidBody { message: reason })
            }
            (e, _) => error_response(&e),
        },
    }
}

/// GET `/health` — liveness check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Helper ────────────────────────────────────────────────────────────────────

fn error_response(err: &AppError) -> Response {
    let (status, message) = match err {
        AppError::UserMismatch { .. } => (StatusCode::FORBIDDEN, "Forbidden"),
        e if e.is_auth() => (StatusCode::UNAUTHORIZED, "Unauthorized"),
        e if e.is_validation() => (StatusCode::BAD_REQUEST, "Invalid request"),
        e if e.is_upstream() => {
            error!("Upstream failure while relaying: {e}");
            (StatusCode::BAD_GATEWAY, "Coach service unavailable")
        }
        e => {
            error!("Internal failure while relaying: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    };

    let body = ProxyErrorBody { error: message.to_string(), details: Some(err.to_string()) };
    (status, Json(body)).into_response()
}
