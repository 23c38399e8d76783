//! HTTP routes for reports
//!
//! - GET /api/v1/reports/statistics
//! - GET /api/v1/reports/student/{id}

use hyper::{Method, Request, Response, StatusCode};

use super::response::{authenticate, data_response, method_not_allowed, not_found_response, FullBody};
use crate::server::AppState;
use crate::types::Result;

pub async fn handle_reports_request<B>(
    req: Request<B>,
    state: &AppState,
    rest: &str,
) -> Result<Response<FullBody>> {
    let identity = authenticate(req.headers(), state)?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    match (req.method().clone(), segments.as_slice()) {
        (Method::GET, ["statistics"]) => {
            let stats = state.reports.statistics(&identity).await?;
            Ok(data_response(StatusCode::OK, &stats))
        }

        (Method::GET, ["student", id]) => {
            let report = state
                .reports
                .student_report(&identity, id, &state.students, &state.achievements)
                .await?;
            Ok(data_response(StatusCode::OK, &report))
        }

        (_, ["statistics"] | ["student", _]) => Ok(method_not_allowed()),

        _ => Ok(not_found_response(&format!("/api/v1/reports{}", rest))),
    }
}
