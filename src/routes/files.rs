//! GET /uploads/{name} - serve a stored evidence file

use http_body_util::Full;
use hyper::{Response, StatusCode};

use super::response::{not_found_response, FullBody};
use crate::server::AppState;
use crate::types::Result;
use crate::uploads::PUBLIC_PREFIX;

pub async fn serve_upload(state: &AppState, name: &str) -> Result<Response<FullBody>> {
    match state.uploads.read(name).await? {
        Some((data, mime)) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", mime)
            .header("Cache-Control", "private, max-age=3600")
            .body(Full::new(data))
            .unwrap()),
        None => Ok(not_found_response(&format!("{}/{}", PUBLIC_PREFIX, name))),
    }
}
