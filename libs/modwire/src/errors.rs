//! Request-time errors and their rendering into the JSON error envelope.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

/// Application error with a well-known HTTP shape:
/// `{"code", "error": {"title", "message"}, "data"}`.
#[derive(Debug, Clone, Error)]
#[error("{title}: {message}")]
pub struct AppError {
    pub status_code: u16,
    pub title: String,
    pub message: String,
    pub data: Option<Value>,
}

impl AppError {
    /// Title defaults to the status code's canonical reason.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        let title = StatusCode::from_u16(status_code)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Error")
            .to_string();
        Self {
            status_code,
            title,
            message: message.into(),
            data: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, message)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Anything a handler (or argument extraction) can fail with.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    App(#[from] AppError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn unknown_handler(name: &str) -> Self {
        HandlerError::Internal(anyhow::anyhow!("no handler named '{name}'"))
    }
}

/// Turns handler errors into responses. Dispatch forwards every error here.
pub trait ErrorFilter: Send + Sync {
    fn catch(&self, error: HandlerError) -> Response;
}

/// Renders [`AppError`] with its own status and everything else as a generic 500.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppExceptionFilter;

impl ErrorFilter for AppExceptionFilter {
    fn catch(&self, error: HandlerError) -> Response {
        match error {
            HandlerError::App(e) => {
                let status =
                    StatusCode::from_u16(e.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                tracing::debug!(status = e.status_code, title = %e.title, "application error");
                let body = json!({
                    "code": status.as_u16(),
                    "error": { "title": e.title, "message": e.message },
                    "data": e.data,
                });
                (status, Json(body)).into_response()
            }
            HandlerError::Internal(e) => {
                tracing::error!(error = ?e, "Unhandled error");
                let body = json!({
                    "code": 500,
                    "error": {
                        "title": "Internal Server Error",
                        "message": "An unexpected error occurred",
                    },
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

/// Response for requests that match no route.
pub fn not_found_response() -> Response {
    let body = json!({
        "code": 404,
        "error": { "title": "Not Found", "message": "Route not found" },
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn app_error_renders_envelope_with_data() {
        let err = AppError::conflict("email taken").with_data(json!({"field": "email"}));
        let resp = AppExceptionFilter.catch(err.into());
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(resp).await,
            json!({
                "code": 409,
                "error": {"title": "Conflict", "message": "email taken"},
                "data": {"field": "email"}
            })
        );
    }

    #[tokio::test]
    async fn app_error_without_data_renders_null() {
        let resp = AppExceptionFilter.catch(AppError::bad_request("nope").into());
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert_eq!(v["data"], Value::Null);
        assert_eq!(v["error"]["title"], "Bad Request");
    }

    #[tokio::test]
    async fn invalid_status_code_reports_the_status_sent() {
        let resp = AppExceptionFilter.catch(AppError::new(42, "bogus").into());
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = body_json(resp).await;
        assert_eq!(v["code"], 500);
        assert_eq!(v["error"]["message"], "bogus");
    }

    #[tokio::test]
    async fn other_errors_render_generic_500() {
        let resp = AppExceptionFilter.catch(anyhow::anyhow!("db exploded").into());
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = body_json(resp).await;
        assert_eq!(v["code"], 500);
        assert_eq!(v["error"]["message"], "An unexpected error occurred");
        assert!(v.get("data").is_none());
    }

    #[tokio::test]
    async fn not_found_envelope() {
        let resp = not_found_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(resp).await,
            json!({"code": 404, "error": {"title": "Not Found", "message": "Route not found"}})
        );
    }

    #[test]
    fn custom_title_and_unknown_status() {
        let e = AppError::new(499, "client went away");
        assert_eq!(e.title, "Error");
        let e = e.with_title("Client Closed Request");
        assert_eq!(e.to_string(), "Client Closed Request: client went away");
    }
}
