//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo; one task per connection.

use bytes::Bytes;
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{JwtValidator, RoleRegistry};
use crate::config::Args;
use crate::content::ContentStore;
use crate::db::{identity, Database};
use crate::repository::AchievementRepository;
use crate::routes::{self, FullBody};
use crate::services::{AchievementService, AuthService, ReportService, StudentService, UserService};
use crate::types::{AppError, Result};
use crate::uploads::{UploadStore, PUBLIC_PREFIX};

const API_PREFIX: &str = "/api/v1";

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub db: Database,
    pub roles: RoleRegistry,
    pub uploads: UploadStore,
    pub auth: AuthService,
    pub users: UserService,
    pub achievements: AchievementService,
    pub students: StudentService,
    pub reports: ReportService,
    /// Which content store is active ("mongodb" or "memory")
    pub content_backend: &'static str,
    pub started_at: Instant,
}

impl AppState {
    /// Wire services over an open database and content store.
    ///
    /// Seeds missing default roles before anything else reads them.
    pub async fn new(
        args: Args,
        db: Database,
        content: Arc<dyn ContentStore>,
        content_backend: &'static str,
    ) -> Result<Self> {
        let roles = db.run(identity::load_role_registry).await?;
        if !roles.is_complete() {
            return Err(AppError::Config("Role table is missing default roles".into()));
        }

        let jwt = JwtValidator::new(
            args.jwt_secret(),
            args.jwt_expiry_seconds,
            args.refresh_expiry_seconds,
        )?;

        let uploads = UploadStore::new(args.upload_dir.clone());
        let repo = AchievementRepository::new(db.clone(), content);

        Ok(Self {
            auth: AuthService::new(db.clone(), jwt, roles.clone()),
            users: UserService::new(db.clone(), roles.clone()),
            achievements: AchievementService::new(repo.clone(), uploads.clone()),
            students: StudentService::new(db.clone()),
            reports: ReportService::new(repo),
            args,
            db,
            roles,
            uploads,
            content_backend,
            started_at: Instant::now(),
        })
    }

    /// Create the configured admin account when it does not exist yet
    pub async fn bootstrap(&self) -> Result<()> {
        let Some((username, password)) = self.args.bootstrap_admin() else {
            return Ok(());
        };
        if self
            .users
            .bootstrap_admin(username, password, &self.args.bootstrap_admin_email)
            .await?
        {
            info!(username = %username, "Bootstrap admin created");
        }
        Ok(())
    }
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Accolade listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - do not use in production");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, Infallible>(handle_request(&state, req).await) }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route one request and attach CORS headers to whatever comes back
pub async fn handle_request<B>(state: &AppState, req: Request<B>) -> Response<FullBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let result = route(state, req, &method, &path).await;
    let mut response = match result {
        Ok(response) => response,
        Err(err) => routes::app_error_response(&err),
    };
    routes::apply_cors(&mut response);

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request"
    );
    response
}

async fn route<B>(
    state: &AppState,
    req: Request<B>,
    method: &Method,
    path: &str,
) -> Result<Response<FullBody>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if method == Method::OPTIONS {
        return Ok(routes::preflight_response());
    }

    if path == "/health" || path == "/healthz" {
        return Ok(routes::health_check(state));
    }

    if let Some(name) = path
        .strip_prefix(PUBLIC_PREFIX)
        .and_then(|p| p.strip_prefix('/'))
    {
        if method != Method::GET {
            return Ok(routes::response::method_not_allowed());
        }
        return routes::serve_upload(state, name).await;
    }

    let Some(api) = path.strip_prefix(API_PREFIX) else {
        return Ok(routes::not_found_response(path));
    };

    // ========================================================================
    // /api/v1 resources
    // ========================================================================
    if let Some(rest) = subpath(api, "/auth") {
        routes::handle_auth_request(req, state, rest).await
    } else if let Some(rest) = subpath(api, "/achievements") {
        routes::handle_achievements_request(req, state, rest).await
    } else if let Some(rest) = subpath(api, "/users") {
        routes::handle_users_request(req, state, rest).await
    } else if let Some(rest) = subpath(api, "/students") {
        routes::handle_students_request(req, state, rest).await
    } else if let Some(rest) = subpath(api, "/advisors") {
        routes::handle_advisors_request(req, state, rest).await
    } else if let Some(rest) = subpath(api, "/reports") {
        routes::handle_reports_request(req, state, rest).await
    } else {
        Ok(routes::not_found_response(path))
    }
}

/// Remainder of `path` below `prefix`, only on a segment boundary
fn subpath<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subpath_respects_segments() {
        assert_eq!(subpath("/users", "/users"), Some(""));
        assert_eq!(subpath("/users/42/role", "/users"), Some("/42/role"));
        assert_eq!(subpath("/usersx", "/users"), None);
        assert_eq!(subpath("/reports/statistics", "/users"), None);
    }
}
