//! HTTP request handlers.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use super::AppState;

/// Liveness probe. Always 200.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// Run one drain cycle on demand.
pub async fn trigger(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&headers, state.service_key.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "Unauthorized" })),
        )
            .into_response();
    }

    match state.worker.executor().drain().await {
        Ok(report) => Json(json!({
            "success": true,
            "processed": report.processed(),
            "report": report,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Triggered drain failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn authorized(headers: &HeaderMap, service_key: Option<&str>) -> bool {
    let Some(expected) = service_key else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| tokens_match(token.as_bytes(), expected.as_bytes()))
}

/// Byte-exact comparison whose running time does not depend on where the
/// first mismatch is.
fn tokens_match(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
