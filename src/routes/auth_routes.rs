//! HTTP routes for authentication
//!
//! - POST /api/v1/auth/login   - Authenticate and get access and refresh tokens
//! - POST /api/v1/auth/refresh - Exchange a refresh token for a new access token
//! - POST /api/v1/auth/logout  - Stateless; the client drops its tokens
//! - GET  /api/v1/auth/profile - Current user with student or advisor profile

use bytes::Bytes;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use tracing::info;

use super::response::{
    authenticate, data_response, message_response, method_not_allowed, not_found_response,
    parse_json, read_body, FullBody,
};
use crate::server::AppState;
use crate::types::Result;

/// Login and refresh bodies are small
const AUTH_BODY_LIMIT: usize = 16 * 1024;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    #[serde(alias = "refresh_token")]
    refresh_token: String,
}

pub async fn handle_auth_request<B>(
    req: Request<B>,
    state: &AppState,
    rest: &str,
) -> Result<Response<FullBody>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match (req.method().clone(), rest) {
        (Method::POST, "/login") => {
            let body = read_body(req.into_body(), AUTH_BODY_LIMIT).await?;
            let login: LoginRequest = parse_json(&body)?;
            let response = state.auth.login(&login.username, &login.password).await?;
            Ok(data_response(StatusCode::OK, &response))
        }

        (Method::POST, "/refresh") => {
            let body = read_body(req.into_body(), AUTH_BODY_LIMIT).await?;
            let refresh: RefreshRequest = parse_json(&body)?;
            let response = state.auth.refresh(&refresh.refresh_token).await?;
            Ok(data_response(StatusCode::OK, &response))
        }

        (Method::POST, "/logout") => {
            let identity = authenticate(req.headers(), state)?;
            info!(user_id = %identity.user_id, "User logged out");
            Ok(message_response(StatusCode::OK, "Logged out"))
        }

        (Method::GET, "/profile") => {
            let identity = authenticate(req.headers(), state)?;
            let profile = state.auth.profile(&identity).await?;
            Ok(data_response(StatusCode::OK, &profile))
        }

        (_, "/login" | "/refresh" | "/logout" | "/profile") => Ok(method_not_allowed()),

        _ => Ok(not_found_response(&format!("/api/v1/auth{}", rest))),
    }
}
