//! Response builders and request helpers shared by every route

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::auth::{extract_token_from_header, Identity};
use crate::server::AppState;
use crate::types::{AppError, Result};

pub type FullBody = Full<Bytes>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
struct DataEnvelope<'a, T: Serialize> {
    data: &'a T,
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// `{"data": ...}` envelope
pub fn data_response<T: Serialize>(status: StatusCode, data: &T) -> Response<FullBody> {
    json_response(status, &DataEnvelope { data })
}

pub fn message_response(status: StatusCode, message: &str) -> Response<FullBody> {
    json_response(status, &serde_json::json!({ "message": message }))
}

pub fn error_response(status: StatusCode, error: &str, code: Option<&str>) -> Response<FullBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: code.map(str::to_string),
        },
    )
}

/// Render an [`AppError`]; server-side failures are logged in full and
/// reach the client only as a generic message
pub fn app_error_response(err: &AppError) -> Response<FullBody> {
    if err.is_server_error() {
        error!(error = %err, "Request failed");
    }
    error_response(err.status_code(), &err.client_message(), Some(err.error_code()))
}

/// CORS preflight response
pub fn preflight_response() -> Response<FullBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

pub fn not_found_response(path: &str) -> Response<FullBody> {
    let body = serde_json::json!({
        "error": "Not Found",
        "code": "NOT_FOUND",
        "path": path,
    });
    json_response(StatusCode::NOT_FOUND, &body)
}

pub fn method_not_allowed() -> Response<FullBody> {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "Method not allowed",
        Some("METHOD_NOT_ALLOWED"),
    )
}

/// CORS headers attached to every response
pub fn apply_cors(response: &mut Response<FullBody>) {
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

/// Collect a request body, refusing anything over `limit` bytes
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(AppError::PayloadTooLarge(format!(
            "Request body exceeds {} bytes",
            limit
        ))),
        Err(e) => Err(AppError::Validation(format!("Failed to read body: {}", e))),
    }
}

pub fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.is_empty() {
        return Err(AppError::Validation("Request body is empty".into()));
    }
    Ok(serde_json::from_slice(bytes)?)
}

pub fn get_auth_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Resolve the bearer token on a request to the calling identity
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Identity> {
    let token = extract_token_from_header(get_auth_header(headers)).ok_or_else(|| {
        AppError::Unauthorized("Missing or malformed Authorization header".into())
    })?;

    state.auth.authenticate(token).map_err(|e| {
        warn!(error = %e, "Token rejected");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_body_enforces_limit() {
        let body = Full::new(Bytes::from_static(b"0123456789"));
        let err = read_body(body, 4).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));

        let body = Full::new(Bytes::from_static(b"0123"));
        assert_eq!(&read_body(body, 4).await.unwrap()[..], b"0123");
    }

    #[test]
    fn test_server_errors_are_sanitized() {
        let response =
            app_error_response(&AppError::Database("UNIQUE constraint failed: users.email".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = error_response(StatusCode::FORBIDDEN, "nope", Some("FORBIDDEN"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "nope");
        assert_eq!(json["code"], "FORBIDDEN");
    }
}
