//! Authentication and authorization for Accolade
//!
//! Provides:
//! - JWT access and refresh tokens
//! - Password hashing with Argon2
//! - Roles resolved from the identity store

pub mod jwt;
pub mod password;
pub mod roles;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenKind, TokenValidationResult};
pub use password::{hash_password, validate_new_password, verify_password};
pub use roles::{Identity, Role, RoleRegistry};
