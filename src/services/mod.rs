//! Business services
//!
//! Each service checks the caller's role and ownership, then delegates to the
//! repository or the identity queries. Handlers in [`crate::routes`] only
//! parse requests and render results.

pub mod achievements;
pub mod auth;
pub mod reports;
pub mod students;
pub mod users;

pub use achievements::{AchievementService, AchievementView, CreateAchievementInput};
pub use auth::{AuthService, LoginResponse, ProfileView, TokenResponse};
pub use reports::{ReportService, Statistics, StudentReport};
pub use students::{AdvisorView, StudentService, StudentView};
pub use users::{
    AdvisorProfileInput, CreateUserInput, StudentProfileInput, UpdateUserInput, UserService,
    UserView,
};

use crate::auth::Identity;
use crate::types::{AppError, Result};

pub(crate) fn require_admin(identity: &Identity) -> Result<()> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin role required".into()))
    }
}

/// Trimmed value of a required text field
pub(crate) fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}
