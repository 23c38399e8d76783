//! Integration tests for the HTTP surface
//!
//! Requests are fed straight into `handle_request` with in-memory bodies, so
//! no socket is opened.

mod common;

use accolade::server::handle_request;
use bytes::Bytes;
use common::{create_campus, Campus, PASSWORD};
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};

const BOUNDARY: &str = "accolade-http-boundary";

fn request(method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Bytes::from(json.to_string())
        }
        None => Bytes::new(),
    };
    builder.body(Full::new(body)).unwrap()
}

fn multipart_request(path: &str, token: &str, body: Vec<u8>) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("Authorization", format!("Bearer {token}"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn json_body(response: Response<Full<Bytes>>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(campus: &Campus, req: Request<Full<Bytes>>) -> (StatusCode, Value) {
    let response = handle_request(&campus.state, req).await;
    let status = response.status();
    (status, json_body(response).await)
}

async fn login(campus: &Campus, username: &str) -> String {
    let (status, body) = send(
        campus,
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": username, "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_cors() {
    let campus = create_campus().await;

    let response = handle_request(&campus.state, request(Method::GET, "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("Access-Control-Allow-Origin").unwrap(),
        "*"
    );
    let body = json_body(response).await;
    assert_eq!(body["healthy"], true);
    assert_eq!(body["contentStore"], "memory");

    let response = handle_request(
        &campus.state,
        request(Method::OPTIONS, "/api/v1/achievements", None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let campus = create_campus().await;

    let (status, body) = send(&campus, request(Method::GET, "/api/v1/achievements", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(
        &campus,
        request(Method::GET, "/api/v1/achievements", Some("not-a-jwt"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_failures() {
    let campus = create_campus().await;

    let (status, body) = send(
        &campus,
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "sinta", "password": "wrong-password" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");

    let (status, body) = send(
        &campus,
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");

    // Deactivated accounts cannot log in
    let admin = login(&campus, "admin").await;
    let path = format!("/api/v1/users/{}", campus.other_student.user_id);
    let (status, _) = send(&campus, request(Method::DELETE, &path, Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &campus,
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "budi", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_refresh_requires_refresh_token() {
    let campus = create_campus().await;

    let (_, body) = send(
        &campus,
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "sinta", "password": PASSWORD })),
        ),
    )
    .await;
    let access = body["data"]["token"].as_str().unwrap().to_string();
    let refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["role"], "STUDENT");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, _) = send(
        &campus,
        request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refreshToken": access })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &campus,
        request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refreshToken": refresh })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let renewed = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &campus,
        request(Method::GET, "/api/v1/auth/profile", Some(&renewed), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "sinta");
    assert_eq!(body["data"]["student"]["student_number"], "S-1001");
}

#[tokio::test]
async fn test_multipart_create_and_advisor_rejection() {
    let campus = create_campus().await;
    let student = login(&campus, "sinta").await;
    let advisor = login(&campus, "dr_rahman").await;

    let body = multipart_body(
        &[
            ("title", "Hackathon"),
            ("achievement_type", "competition"),
            ("points", "50"),
            ("tags", "coding,teamwork"),
        ],
        Some(("certificate.pdf", b"%PDF-1.4 evidence")),
    );
    let (status, created) = send(
        &campus,
        multipart_request("/api/v1/achievements", &student, body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["status"], "DRAFT");

    let (status, fetched) = send(
        &campus,
        request(Method::GET, &format!("/api/v1/achievements/{id}"), Some(&student), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let attachments = fetched["data"]["content"]["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(fetched["data"]["content"]["points"], 50);

    // The stored file is served back
    let url = attachments[0]["fileUrl"].as_str().unwrap().to_string();
    let response = handle_request(&campus.state, request(Method::GET, &url, None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("Content-Type").unwrap(), "application/pdf");

    let (status, _) = send(
        &campus,
        request(Method::POST, &format!("/api/v1/achievements/{id}/submit"), Some(&student), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, rejected) = send(
        &campus,
        request(
            Method::POST,
            &format!("/api/v1/achievements/{id}/verify"),
            Some(&advisor),
            Some(json!({ "status": "REJECTED", "notes": "Certificate is blurry" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{rejected}");
    assert_eq!(rejected["data"]["status"], "REJECTED");
    assert_eq!(rejected["data"]["rejection_note"], "Certificate is blurry");

    let (status, history) = send(
        &campus,
        request(Method::GET, &format!("/api/v1/achievements/{id}/history"), Some(&advisor), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"][0]["new_status"], "REJECTED");
    assert_eq!(history["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_error_statuses() {
    let campus = create_campus().await;
    let student = login(&campus, "sinta").await;
    let other = login(&campus, "budi").await;

    let (status, created) = send(
        &campus,
        request(
            Method::POST,
            "/api/v1/achievements",
            Some(&student),
            Some(json!({ "title": "Olympiad", "achievement_type": "academic" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &campus,
        request(Method::POST, &format!("/api/v1/achievements/{id}/submit"), Some(&other), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = send(
        &campus,
        request(Method::GET, "/api/v1/achievements/does-not-exist", Some(&student), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(
        &campus,
        request(
            Method::POST,
            "/api/v1/achievements",
            Some(&student),
            Some(json!({ "title": "  ", "achievement_type": "academic" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long_title = "x".repeat(70_000);
    let oversized = multipart_body(&[("title", long_title.as_str())], None);
    let (status, body) = send(
        &campus,
        multipart_request("/api/v1/achievements", &student, oversized),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");

    let (status, _) = send(&campus, request(Method::GET, "/api/v1/nothing-here", Some(&student), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &campus,
        request(Method::PATCH, &format!("/api/v1/achievements/{id}"), Some(&student), None),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_student_and_advisor_routes() {
    let campus = create_campus().await;
    let admin = login(&campus, "admin").await;
    let advisor = login(&campus, "dr_rahman").await;
    let student = login(&campus, "sinta").await;

    let (status, body) = send(&campus, request(Method::GET, "/api/v1/students", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send(&campus, request(Method::GET, "/api/v1/students", Some(&advisor), None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["username"], "sinta");

    let (status, _) = send(
        &campus,
        request(
            Method::GET,
            &format!("/api/v1/advisors/{}/advisees", campus.advisor_profile),
            Some(&student),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unassign, after which the advisor no longer sees the student
    let (status, body) = send(
        &campus,
        request(
            Method::PUT,
            &format!("/api/v1/students/{}/advisor", campus.student_profile),
            Some(&admin),
            Some(json!({ "advisor_id": null })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["advisor_id"].is_null());

    let (status, _) = send(
        &campus,
        request(
            Method::GET,
            &format!("/api/v1/students/{}", campus.student_profile),
            Some(&advisor),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &campus,
        request(Method::GET, "/api/v1/reports/statistics", Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["scope"], "global");
    assert_eq!(body["data"]["total_students"], 2);
}

#[tokio::test]
async fn test_duplicate_username_conflict_has_fixed_message() {
    let campus = create_campus().await;
    let admin = login(&campus, "admin").await;
    let role_id = campus
        .state
        .roles
        .id_for(accolade::auth::Role::Student)
        .unwrap()
        .to_string();

    let (status, body) = send(
        &campus,
        request(
            Method::POST,
            "/api/v1/users",
            Some(&admin),
            Some(json!({
                "username": "sinta",
                "email": "another-sinta@campus.test",
                "password": PASSWORD,
                "full_name": "Sinta Again",
                "role_id": role_id,
                "student_profile": { "student_number": "S-9999" }
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["error"], "Username already exists");
    assert!(!body.to_string().contains("UNIQUE constraint"));
}
