//! # Request Handlers
//!
//! Axum request handlers for the storefront API, grouped by area.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod revalidate;
pub mod webhook;

use axum::{
    extract::{FromRequest, Request},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shop_core::StoreError;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message, status.as_u16())))
}

pub(crate) fn store_error_to_response(err: StoreError) -> ApiError {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// Status of `err` with a fixed public message; the detail stays in the logs
pub(crate) fn masked_error(err: &StoreError, message: &str) -> ApiError {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, message)
}

/// Body extractor accepting JSON or an urlencoded form, chosen by
/// `Content-Type`
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| Self(value))
                .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))
        } else {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| Self(value))
                .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))
        }
    }
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400);
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({ "error": "Test error", "code": 400 })
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let (status, Json(body)) = store_error_to_response(StoreError::ProductNotFound {
            product_id: "prod_x".to_string(),
        });
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, 404);
        assert!(body.error.contains("prod_x"));
    }

    #[test]
    fn test_masked_error_keeps_status() {
        let (status, Json(body)) = masked_error(
            &StoreError::NetworkError("connect refused".to_string()),
            "Try later",
        );
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error, "Try later");
    }
}
