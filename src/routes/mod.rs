//! HTTP routes for Accolade

pub mod achievements;
pub mod auth_routes;
pub mod files;
pub mod health;
pub mod multipart;
pub mod reports;
pub mod response;
pub mod students;
pub mod users;

pub use achievements::handle_achievements_request;
pub use auth_routes::handle_auth_request;
pub use files::serve_upload;
pub use health::health_check;
pub use reports::handle_reports_request;
pub use response::{app_error_response, apply_cors, not_found_response, preflight_response, FullBody};
pub use students::{handle_advisors_request, handle_students_request};
pub use users::handle_users_request;
