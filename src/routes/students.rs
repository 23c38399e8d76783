//! HTTP routes for student and advisor profiles
//!
//! - GET /api/v1/students
//! - GET /api/v1/students/{id}
//! - GET /api/v1/students/{id}/achievements
//! - PUT /api/v1/students/{id}/advisor
//! - GET /api/v1/advisors
//! - GET /api/v1/advisors/{id}/advisees

use bytes::Bytes;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;

use super::response::{
    authenticate, data_response, method_not_allowed, not_found_response, parse_json, read_body,
    FullBody,
};
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Deserialize)]
struct AdvisorRequest {
    /// `null` clears the assignment
    advisor_id: Option<String>,
}

pub async fn handle_students_request<B>(
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
    let students = &state.students;

    match (req.method().clone(), segments.as_slice()) {
        (Method::GET, []) => Ok(data_response(StatusCode::OK, &students.list(&identity).await?)),

        (Method::GET, [id]) => Ok(data_response(StatusCode::OK, &students.get(&identity, id).await?)),

        (Method::GET, [id, "achievements"]) => {
            let views = students
                .achievements(&identity, id, &state.achievements)
                .await?;
            Ok(data_response(StatusCode::OK, &views))
        }

        (Method::PUT, [id, "advisor"]) => {
            let body = read_body(req.into_body(), 16 * 1024).await?;
            let input: AdvisorRequest = parse_json(&body)?;
            let student = students.set_advisor(&identity, id, input.advisor_id).await?;
            Ok(data_response(StatusCode::OK, &student))
        }

        (_, [] | [_] | [_, "achievements" | "advisor"]) => Ok(method_not_allowed()),

        _ => Ok(not_found_response(&format!("/api/v1/students{}", rest))),
    }
}

pub async fn handle_advisors_request<B>(
    req: Request<B>,
    state: &AppState,
    rest: &str,
) -> Result<Response<FullBody>> {
    let identity = authenticate(req.headers(), state)?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    match (req.method().clone(), segments.as_slice()) {
        (Method::GET, []) => {
            let advisors = state.students.list_advisors(&identity).await?;
            Ok(data_response(StatusCode::OK, &advisors))
        }

        (Method::GET, [id, "advisees"]) => {
            let advisees = state.students.advisees(&identity, id).await?;
            Ok(data_response(StatusCode::OK, &advisees))
        }

        (_, [] | [_, "advisees"]) => Ok(method_not_allowed()),

        _ => Ok(not_found_response(&format!("/api/v1/advisors{}", rest))),
    }
}
