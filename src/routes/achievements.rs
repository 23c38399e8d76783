//! HTTP routes for achievements
//!
//! - GET    /api/v1/achievements
//! - POST   /api/v1/achievements                  (multipart or JSON)
//! - GET    /api/v1/achievements/{id}
//! - PUT    /api/v1/achievements/{id}
//! - DELETE /api/v1/achievements/{id}
//! - POST   /api/v1/achievements/{id}/submit
//! - POST   /api/v1/achievements/{id}/verify
//! - POST   /api/v1/achievements/{id}/reject
//! - GET    /api/v1/achievements/{id}/history
//! - POST   /api/v1/achievements/{id}/attachments (multipart)

use bytes::Bytes;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;

use super::multipart::MultipartForm;
use super::response::{
    authenticate, content_type, data_response, json_response, message_response,
    method_not_allowed, not_found_response, parse_json, read_body, FullBody,
};
use crate::content::{ContentPatch, Details};
use crate::server::AppState;
use crate::services::CreateAchievementInput;
use crate::types::{AchievementStatus, AppError, Result};

#[derive(Debug, Default, Deserialize)]
struct VerifyRequest {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    #[serde(default)]
    notes: String,
}

fn is_multipart(ct: Option<&str>) -> bool {
    ct.is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
}

fn parse_points(value: Option<&str>) -> Result<i64> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(0),
        Some(v) => v
            .parse()
            .map_err(|_| AppError::Validation(format!("points must be an integer, got '{}'", v))),
    }
}

/// Creation input from a multipart form; `details` may be sent as a JSON text field
fn input_from_form(form: &MultipartForm) -> Result<CreateAchievementInput> {
    let details = match form.text("details").map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => Some(serde_json::from_str::<Details>(raw)?),
        None => None,
    };

    Ok(CreateAchievementInput {
        title: form.text("title").unwrap_or_default().to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
        achievement_type: form
            .text("achievement_type")
            .or_else(|| form.text("achievementType"))
            .unwrap_or_default()
            .to_string(),
        points: parse_points(form.text("points"))?,
        tags: form.tags(),
        details,
    })
}

pub async fn handle_achievements_request<B>(
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
    let method = req.method().clone();
    let service = &state.achievements;
    let limit = state.args.max_upload_bytes;

    match (method, segments.as_slice()) {
        (Method::GET, []) => {
            let views = service.list(&identity).await?;
            Ok(data_response(StatusCode::OK, &views))
        }

        (Method::POST, []) => {
            let ct = content_type(req.headers()).map(str::to_string);
            let body = read_body(req.into_body(), limit).await?;

            let (input, file) = if is_multipart(ct.as_deref()) {
                let mut form = MultipartForm::parse(ct.as_deref().unwrap_or_default(), body).await?;
                (input_from_form(&form)?, form.take_file())
            } else {
                (parse_json::<CreateAchievementInput>(&body)?, None)
            };

            let view = service.create(&identity, input, file).await?;
            Ok(json_response(
                StatusCode::CREATED,
                &serde_json::json!({ "id": view.ref_id, "data": view }),
            ))
        }

        (Method::GET, [id]) => {
            let view = service.get(&identity, id).await?;
            Ok(data_response(StatusCode::OK, &view))
        }

        (Method::PUT, [id]) => {
            let body = read_body(req.into_body(), limit).await?;
            let patch: ContentPatch = parse_json(&body)?;
            let view = service.update(&identity, id, patch).await?;
            Ok(data_response(StatusCode::OK, &view))
        }

        (Method::DELETE, [id]) => {
            service.delete(&identity, id).await?;
            Ok(message_response(StatusCode::OK, "Achievement deleted"))
        }

        (Method::POST, [id, "submit"]) => {
            let view = service.submit(&identity, id).await?;
            Ok(data_response(StatusCode::OK, &view))
        }

        (Method::POST, [id, "verify"]) => {
            let body = read_body(req.into_body(), limit).await?;
            let request: VerifyRequest = if body.iter().all(u8::is_ascii_whitespace) {
                VerifyRequest::default()
            } else {
                parse_json(&body)?
            };

            let target = match request.status.as_deref().map(str::trim) {
                None | Some("") => AchievementStatus::Verified,
                Some(s) => s.parse()?,
            };

            let view = match target {
                AchievementStatus::Verified => service.verify(&identity, id, request.notes).await?,
                AchievementStatus::Rejected => {
                    service
                        .reject(&identity, id, request.notes.as_deref().unwrap_or_default())
                        .await?
                }
                other => {
                    return Err(AppError::Validation(format!(
                        "status must be VERIFIED or REJECTED, got {}",
                        other
                    )))
                }
            };
            Ok(data_response(StatusCode::OK, &view))
        }

        (Method::POST, [id, "reject"]) => {
            let body = read_body(req.into_body(), limit).await?;
            let request: RejectRequest = parse_json(&body)?;
            let view = service.reject(&identity, id, &request.notes).await?;
            Ok(data_response(StatusCode::OK, &view))
        }

        (Method::GET, [id, "history"]) => {
            let history = service.history(&identity, id).await?;
            Ok(data_response(StatusCode::OK, &history))
        }

        (Method::POST, [id, "attachments"]) => {
            let ct = content_type(req.headers()).map(str::to_string);
            if !is_multipart(ct.as_deref()) {
                return Err(AppError::Validation(
                    "Attachments must be sent as multipart/form-data".into(),
                ));
            }
            let body = read_body(req.into_body(), limit).await?;
            let mut form = MultipartForm::parse(ct.as_deref().unwrap_or_default(), body).await?;
            let file = form
                .take_file()
                .ok_or_else(|| AppError::Validation("file field is required".into()))?;

            let attachment = service.upload_attachment(&identity, id, file).await?;
            Ok(data_response(StatusCode::OK, &attachment))
        }

        (_, [] | [_] | [_, "submit" | "verify" | "reject" | "history" | "attachments"]) => {
            Ok(method_not_allowed())
        }

        _ => Ok(not_found_response(&format!("/api/v1/achievements{}", rest))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_parsing() {
        assert_eq!(parse_points(None).unwrap(), 0);
        assert_eq!(parse_points(Some(" 50 ")).unwrap(), 50);
        assert!(matches!(parse_points(Some("fifty")), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_multipart_detection() {
        assert!(is_multipart(Some("multipart/form-data; boundary=x")));
        assert!(is_multipart(Some("Multipart/Form-Data; boundary=x")));
        assert!(!is_multipart(Some("application/json")));
        assert!(!is_multipart(None));
    }
}
