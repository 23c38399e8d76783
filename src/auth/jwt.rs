//! JWT token handling
//!
//! Access and refresh tokens are HS256-signed and carry the user id and the
//! role id from the identity store. The role id is resolved to a
//! [`Role`](crate::auth::Role) per request through the role registry.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::AppError;

/// Default access token lifetime (2 hours)
pub const DEFAULT_ACCESS_EXPIRY_SECONDS: u64 = 2 * 60 * 60;
/// Default refresh token lifetime (72 hours)
pub const DEFAULT_REFRESH_EXPIRY_SECONDS: u64 = 72 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    /// Id of the user's row in the `roles` table
    pub role_id: String,
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Input for creating a new token
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub user_id: String,
    pub username: String,
    pub role_id: String,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }

    /// Claims of a valid token of the expected kind
    pub fn into_claims(self, expected: TokenKind) -> Result<Claims, AppError> {
        match self.claims {
            Some(claims) if self.valid && claims.kind == expected => Ok(claims),
            Some(_) if self.valid => Err(AppError::Unauthorized("Wrong token type".into())),
            _ => Err(AppError::Unauthorized(
                self.error.unwrap_or_else(|| "Invalid token".into()),
            )),
        }
    }
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    access_expiry_seconds: u64,
    refresh_expiry_seconds: u64,
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(
        secret: String,
        access_expiry_seconds: u64,
        refresh_expiry_seconds: u64,
    ) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(AppError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            access_expiry_seconds,
            refresh_expiry_seconds,
        })
    }

    pub fn access_expiry_seconds(&self) -> u64 {
        self.access_expiry_seconds
    }

    /// Generate an access token for an authenticated user
    pub fn generate_token(&self, input: &TokenInput) -> Result<String, AppError> {
        self.sign(input, TokenKind::Access, self.access_expiry_seconds)
    }

    /// Generate a refresh token with the longer expiry
    pub fn generate_refresh_token(&self, input: &TokenInput) -> Result<String, AppError> {
        self.sign(input, TokenKind::Refresh, self.refresh_expiry_seconds)
    }

    fn sign(&self, input: &TokenInput, kind: TokenKind, ttl: u64) -> Result<String, AppError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: input.user_id.clone(),
            username: input.username.clone(),
            role_id: input.role_id.clone(),
            kind,
            iat: now,
            exp: now + ttl,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let validation = Validation::default();

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenValidationResult::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token validation failed",
                };
                TokenValidationResult::invalid(error_msg)
            }
        }
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}
