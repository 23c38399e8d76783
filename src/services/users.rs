//! User management
//!
//! Admins create, list, update and deactivate accounts. Users may read and
//! update their own account but never change their own role. Deletion is a
//! soft delete (`is_active = false`).

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{require_admin, required};
use crate::auth::{hash_password, validate_new_password, Identity, Role, RoleRegistry};
use crate::db::identity::{self as identity_db, CreateAdvisor, CreateStudent, CreateUser};
use crate::db::models::{UserChanges, UserRow};
use crate::db::Database;
use crate::types::{AppError, Result};

/// Account as returned to clients; never includes the password hash
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role_id: String,
    pub role: Option<Role>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl UserView {
    pub fn from_row(row: UserRow, roles: &RoleRegistry) -> Self {
        Self {
            role: roles.role_for(&row.role_id),
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            role_id: row.role_id,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentProfileInput {
    pub student_number: String,
    #[serde(default)]
    pub program_study: String,
    #[serde(default)]
    pub academic_year: String,
    #[serde(default)]
    pub advisor_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorProfileInput {
    pub lecturer_number: String,
    #[serde(default)]
    pub department: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role_id: String,
    #[serde(default)]
    pub student_profile: Option<StudentProfileInput>,
    #[serde(default)]
    pub advisor_profile: Option<AdvisorProfileInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<String>,
}

fn validate_email(email: &str) -> Result<String> {
    let email = required("email", email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation("email is not valid".into())),
    }
}

pub struct UserService {
    db: Database,
    roles: RoleRegistry,
}

impl UserService {
    pub fn new(db: Database, roles: RoleRegistry) -> Self {
        Self { db, roles }
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    fn role_of(&self, role_id: &str) -> Result<Role> {
        self.roles
            .role_for(role_id)
            .ok_or_else(|| AppError::Validation(format!("Unknown role_id '{}'", role_id)))
    }

    fn view(&self, row: UserRow) -> UserView {
        UserView::from_row(row, &self.roles)
    }

    /// All users, newest first (admin only)
    pub async fn list(&self, identity: &Identity) -> Result<Vec<UserView>> {
        require_admin(identity)?;
        let rows = self.db.run(identity_db::list_users).await?;
        Ok(rows.into_iter().map(|r| self.view(r)).collect())
    }

    /// One user (admin or self)
    pub async fn get(&self, identity: &Identity, id: &str) -> Result<UserView> {
        if !identity.is_admin() && identity.user_id != id {
            return Err(AppError::Forbidden("You can only view your own account".into()));
        }
        let id = id.to_string();
        let row = self
            .db
            .run(move |conn| {
                identity_db::get_user(conn, &id)?
                    .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
            })
            .await?;
        Ok(self.view(row))
    }

    /// Create an account and, for students and advisors, its profile
    pub async fn create(&self, identity: &Identity, input: CreateUserInput) -> Result<UserView> {
        require_admin(identity)?;
        self.create_unchecked(input).await
    }

    async fn create_unchecked(&self, input: CreateUserInput) -> Result<UserView> {
        let username = required("username", &input.username)?;
        let email = validate_email(&input.email)?;
        let full_name = required("full_name", &input.full_name)?;
        validate_new_password(&input.password)?;
        let role = self.role_of(&input.role_id)?;

        if input.student_profile.is_some() && role != Role::Student {
            return Err(AppError::Validation(
                "student_profile is only allowed for the Student role".into(),
            ));
        }
        if input.advisor_profile.is_some() && role != Role::Advisor {
            return Err(AppError::Validation(
                "advisor_profile is only allowed for the Advisor role".into(),
            ));
        }
        if let Some(profile) = &input.student_profile {
            required("student_number", &profile.student_number)?;
        }
        if let Some(profile) = &input.advisor_profile {
            required("lecturer_number", &profile.lecturer_number)?;
        }

        let password_hash = hash_password(&input.password)?;
        let role_id = input.role_id;
        let student_profile = input.student_profile;
        let advisor_profile = input.advisor_profile;

        let row = self
            .db
            .transaction(move |conn| {
                let user = identity_db::insert_user(
                    conn,
                    &CreateUser {
                        username: &username,
                        email: &email,
                        password_hash: &password_hash,
                        full_name: &full_name,
                        role_id: &role_id,
                    },
                )?;

                if let Some(profile) = &student_profile {
                    if let Some(advisor_id) = profile.advisor_id.as_deref() {
                        if identity_db::get_advisor(conn, advisor_id)?.is_none() {
                            return Err(AppError::Validation(format!(
                                "Advisor {} does not exist",
                                advisor_id
                            )));
                        }
                    }
                    identity_db::insert_student(
                        conn,
                        &CreateStudent {
                            user_id: &user.id,
                            student_number: profile.student_number.trim(),
                            program_study: profile.program_study.trim(),
                            academic_year: profile.academic_year.trim(),
                            advisor_id: profile.advisor_id.as_deref(),
                        },
                    )?;
                }

                if let Some(profile) = &advisor_profile {
                    identity_db::insert_advisor(
                        conn,
                        &CreateAdvisor {
                            user_id: &user.id,
                            lecturer_number: profile.lecturer_number.trim(),
                            department: profile.department.trim(),
                        },
                    )?;
                }

                Ok(user)
            })
            .await?;

        info!(user_id = %row.id, username = %row.username, role = %role, "User created");
        Ok(self.view(row))
    }

    /// Update account fields (admin or self; only admins change roles)
    pub async fn update(&self, identity: &Identity, id: &str, input: UpdateUserInput) -> Result<UserView> {
        if !identity.is_admin() && identity.user_id != id {
            return Err(AppError::Forbidden("You can only update your own account".into()));
        }
        if input.role_id.is_some() && !identity.is_admin() {
            return Err(AppError::Forbidden("Only an admin can change roles".into()));
        }

        let mut changes = UserChanges::default();
        if let Some(username) = &input.username {
            changes.username = Some(required("username", username)?);
        }
        if let Some(email) = &input.email {
            changes.email = Some(validate_email(email)?);
        }
        if let Some(full_name) = &input.full_name {
            changes.full_name = Some(required("full_name", full_name)?);
        }
        if let Some(password) = &input.password {
            validate_new_password(password)?;
            changes.password_hash = Some(hash_password(password)?);
        }
        if let Some(role_id) = &input.role_id {
            self.role_of(role_id)?;
            changes.role_id = Some(role_id.clone());
        }

        let id = id.to_string();
        let row = self
            .db
            .run(move |conn| identity_db::update_user(conn, &id, changes))
            .await?;
        Ok(self.view(row))
    }

    /// Change a user's role (admin only)
    pub async fn update_role(&self, identity: &Identity, id: &str, role_id: &str) -> Result<UserView> {
        require_admin(identity)?;
        let role = self.role_of(role_id)?;

        let changes = UserChanges {
            role_id: Some(role_id.to_string()),
            ..Default::default()
        };
        let id = id.to_string();
        let row = self
            .db
            .run(move |conn| identity_db::update_user(conn, &id, changes))
            .await?;

        info!(user_id = %row.id, role = %role, "User role changed");
        Ok(self.view(row))
    }

    /// Soft delete (admin only); admins cannot deactivate themselves
    pub async fn deactivate(&self, identity: &Identity, id: &str) -> Result<()> {
        require_admin(identity)?;
        if identity.user_id == id {
            return Err(AppError::BusinessRule("You cannot deactivate your own account".into()));
        }

        let changes = UserChanges {
            is_active: Some(false),
            ..Default::default()
        };
        let id = id.to_string();
        let row = self
            .db
            .run(move |conn| identity_db::update_user(conn, &id, changes))
            .await?;

        info!(user_id = %row.id, "User deactivated");
        Ok(())
    }

    /// Create the configured admin account if no user has that username yet.
    ///
    /// Returns whether an account was created.
    pub async fn bootstrap_admin(&self, username: &str, password: &str, email: &str) -> Result<bool> {
        let lookup = username.to_string();
        let existing = self
            .db
            .run(move |conn| identity_db::get_user_by_username(conn, &lookup))
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let role_id = self
            .roles
            .id_for(Role::Admin)
            .ok_or_else(|| AppError::Config("Admin role missing from registry".into()))?
            .to_string();

        self.create_unchecked(CreateUserInput {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            full_name: "Administrator".to_string(),
            role_id,
            student_profile: None,
            advisor_profile: None,
        })
        .await?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(validate_email("sinta@campus.ac.id").is_ok());
        assert!(validate_email("sinta").is_err());
        assert!(validate_email("@campus.ac.id").is_err());
        assert!(validate_email("  ").is_err());
    }

    #[test]
    fn test_user_view_never_has_password() {
        let row = UserRow {
            id: "u1".into(),
            username: "sinta".into(),
            email: "sinta@campus.ac.id".into(),
            password_hash: "$argon2id$secret".into(),
            full_name: "Sinta".into(),
            role_id: "r1".into(),
            is_active: true,
            created_at: "t".into(),
            updated_at: "t".into(),
        };
        let registry = RoleRegistry::from_rows(vec![("r1".to_string(), "Student".to_string())]);

        let json = serde_json::to_string(&UserView::from_row(row.clone(), &registry)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"role\":\"STUDENT\""));

        let raw = serde_json::to_string(&row).unwrap();
        assert!(!raw.contains("argon2"));
    }
}
