//! HTTP routes for user management
//!
//! - GET    /api/v1/users
//! - POST   /api/v1/users
//! - GET    /api/v1/users/{id}
//! - PUT    /api/v1/users/{id}
//! - DELETE /api/v1/users/{id}
//! - PUT    /api/v1/users/{id}/role

use bytes::Bytes;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;

use super::response::{
    authenticate, data_response, message_response, method_not_allowed, not_found_response,
    parse_json, read_body, FullBody,
};
use crate::server::AppState;
use crate::services::{CreateUserInput, UpdateUserInput};
use crate::types::Result;

const USER_BODY_LIMIT: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct RoleRequest {
    role_id: String,
}

pub async fn handle_users_request<B>(
    req: Request<B>,
    state: &AppState,
    rest: &str,
) -> Result<Response<FullBody>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let identity = authenticate(req.headers(), state)?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let users = &state.users;

    match (req.method().clone(), segments.as_slice()) {
        (Method::GET, []) => Ok(data_response(StatusCode::OK, &users.list(&identity).await?)),

        (Method::POST, []) => {
            let body = read_body(req.into_body(), USER_BODY_LIMIT).await?;
            let input: CreateUserInput = parse_json(&body)?;
            let user = users.create(&identity, input).await?;
            Ok(data_response(StatusCode::CREATED, &user))
        }

        (Method::GET, [id]) => Ok(data_response(StatusCode::OK, &users.get(&identity, id).await?)),

        (Method::PUT, [id]) => {
            let body = read_body(req.into_body(), USER_BODY_LIMIT).await?;
            let input: UpdateUserInput = parse_json(&body)?;
            let user = users.update(&identity, id, input).await?;
            Ok(data_response(StatusCode::OK, &user))
        }

        (Method::DELETE, [id]) => {
            users.deactivate(&identity, id).await?;
            Ok(message_response(StatusCode::OK, "User deactivated"))
        }

        (Method::PUT, [id, "role"]) => {
            let body = read_body(req.into_body(), USER_BODY_LIMIT).await?;
            let input: RoleRequest = parse_json(&body)?;
            let user = users.update_role(&identity, id, &input.role_id).await?;
            Ok(data_response(StatusCode::OK, &user))
        }

        (_, [] | [_] | [_, "role"]) => Ok(method_not_allowed()),

        _ => Ok(not_found_response(&format!("/api/v1/users{}", rest))),
    }
}
