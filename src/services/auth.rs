//! Login, token refresh and the caller's profile

use serde::Serialize;
use tracing::{debug, info, warn};

use super::users::UserView;
use crate::auth::{
    verify_password, Identity, JwtValidator, RoleRegistry, TokenInput, TokenKind,
};
use crate::db::identity as identity_db;
use crate::db::models::{AdvisorRow, StudentRow, UserRow};
use crate::db::Database;
use crate::types::{AppError, Result};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: u64,
}

/// The caller's account with whichever profile it owns
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user: UserView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisor: Option<AdvisorRow>,
}

pub struct AuthService {
    db: Database,
    jwt: JwtValidator,
    roles: RoleRegistry,
}

impl AuthService {
    pub fn new(db: Database, jwt: JwtValidator, roles: RoleRegistry) -> Self {
        Self { db, jwt, roles }
    }

    fn token_input(user: &UserRow) -> TokenInput {
        TokenInput {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role_id: user.role_id.clone(),
        }
    }

    async fn load_user(&self, id: &str) -> Result<Option<UserRow>> {
        let id = id.to_string();
        self.db
            .run(move |conn| identity_db::get_user(conn, &id))
            .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let lookup = username.trim().to_string();
        if lookup.is_empty() || password.is_empty() {
            return Err(AppError::Validation("username and password are required".into()));
        }

        let user = self
            .db
            .run(move |conn| identity_db::get_user_by_username(conn, &lookup))
            .await?;

        let Some(user) = user else {
            debug!(username = %username, "Login for unknown user");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Login with wrong password");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        if !user.is_active {
            warn!(user_id = %user.id, "Login for inactive account refused");
            return Err(AppError::Forbidden("Account is inactive".into()));
        }

        let input = Self::token_input(&user);
        let token = self.jwt.generate_token(&input)?;
        let refresh_token = self.jwt.generate_refresh_token(&input)?;

        info!(user_id = %user.id, username = %user.username, "User logged in");

        Ok(LoginResponse {
            token,
            refresh_token,
            expires_in: self.jwt.access_expiry_seconds(),
            user: UserView::from_row(user, &self.roles),
        })
    }

    /// Issue a new access token from a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let claims = self
            .jwt
            .verify_token(refresh_token)
            .into_claims(TokenKind::Refresh)?;

        let user = self
            .load_user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))?;
        if !user.is_active {
            return Err(AppError::Forbidden("Account is inactive".into()));
        }

        let token = self.jwt.generate_token(&Self::token_input(&user))?;
        Ok(TokenResponse {
            token,
            expires_in: self.jwt.access_expiry_seconds(),
        })
    }

    /// Resolve an access token to the calling identity
    pub fn authenticate(&self, token: &str) -> Result<Identity> {
        let claims = self.jwt.verify_token(token).into_claims(TokenKind::Access)?;
        let role = self
            .roles
            .role_for(&claims.role_id)
            .ok_or_else(|| AppError::Unauthorized("Token carries an unknown role".into()))?;
        Ok(Identity::new(claims.sub, role))
    }

    pub async fn profile(&self, identity: &Identity) -> Result<ProfileView> {
        let user_id = identity.user_id.clone();
        let (user, student, advisor) = self
            .db
            .run(move |conn| {
                let user = identity_db::get_user(conn, &user_id)?
                    .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
                let student = identity_db::get_student_by_user(conn, &user_id)?;
                let advisor = identity_db::get_advisor_by_user(conn, &user_id)?;
                Ok((user, student, advisor))
            })
            .await?;

        Ok(ProfileView {
            user: UserView::from_row(user, &self.roles),
            student,
            advisor,
        })
    }
}
