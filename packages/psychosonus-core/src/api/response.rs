//! JSON response helpers shared by the HTTP handlers.
//!
//! Success bodies are `{"success": true, ...fields}`; errors use the same
//! `{error, message, status}` shape as [`PsychosonusError`](crate::error::PsychosonusError).

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Wraps a serializable payload in a success envelope.
///
/// Object payloads are flattened into the envelope; anything else is placed
/// under `data`.
pub fn api_success<T: Serialize>(payload: T) -> Response {
    let body = match serde_json::to_value(payload) {
        Ok(Value::Object(mut map)) => {
            map.insert("success".into(), Value::Bool(true));
            Value::Object(map)
        }
        Ok(other) => json!({ "success": true, "data": other }),
        Err(e) => {
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "serialization_failed", e);
        }
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Bare success acknowledgment.
pub fn api_ok() -> Response {
    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}

/// Error response with an explicit status and machine-readable code.
pub fn api_error(status: StatusCode, code: &str, message: impl Display) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.to_string(),
            "status": status.as_u16(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_flattens_objects() {
        let body = body_json(api_success(json!({ "queueSize": 3 }))).await;
        assert_eq!(body, json!({ "success": true, "queueSize": 3 }));
    }

    #[tokio::test]
    async fn success_wraps_non_objects() {
        let body = body_json(api_success(vec![1, 2])).await;
        assert_eq!(body, json!({ "success": true, "data": [1, 2] }));
    }

    #[tokio::test]
    async fn error_has_code_and_status() {
        let response = api_error(StatusCode::NOT_FOUND, "missing", "no such thing");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "missing");
        assert_eq!(body["status"], 404);
    }
}
