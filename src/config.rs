//! Configuration for Accolade
//!
//! CLI arguments with environment variable fallbacks using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::jwt::{DEFAULT_ACCESS_EXPIRY_SECONDS, DEFAULT_REFRESH_EXPIRY_SECONDS};
use crate::db::PoolSettings;

/// Accolade - student achievement reporting and verification backend
#[derive(Parser, Debug, Clone)]
#[command(name = "accolade")]
#[command(about = "Student achievement reporting and verification backend")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (dev JWT secret, in-memory content fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// SQLite database file for users, references and history
    #[arg(long, env = "DATABASE_URL", default_value = "accolade.db")]
    pub database_url: String,

    /// Idle connections kept in the pool
    #[arg(long, env = "DB_POOL_MIN_IDLE", default_value = "5")]
    pub db_pool_min_idle: u32,

    /// Upper bound on pooled connections
    #[arg(long, env = "DB_POOL_MAX_SIZE", default_value = "20")]
    pub db_pool_max_size: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, env = "DB_CONNECT_TIMEOUT_SECS", default_value = "10")]
    pub db_connect_timeout_secs: u64,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "accolade")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Access token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value_t = DEFAULT_ACCESS_EXPIRY_SECONDS)]
    pub jwt_expiry_seconds: u64,

    /// Refresh token expiry in seconds
    #[arg(long, env = "REFRESH_EXPIRY_SECONDS", default_value_t = DEFAULT_REFRESH_EXPIRY_SECONDS)]
    pub refresh_expiry_seconds: u64,

    /// Directory for uploaded evidence files
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Maximum request body size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Username of an admin account created at startup if missing
    #[arg(long, env = "BOOTSTRAP_ADMIN_USERNAME")]
    pub bootstrap_admin_username: Option<String>,

    /// Password for the bootstrap admin
    #[arg(long, env = "BOOTSTRAP_ADMIN_PASSWORD")]
    pub bootstrap_admin_password: Option<String>,

    /// Email for the bootstrap admin
    #[arg(long, env = "BOOTSTRAP_ADMIN_EMAIL", default_value = "admin@localhost.local")]
    pub bootstrap_admin_email: String,
}

impl Args {
    /// Get JWT secret, using dev default if in dev mode
    pub fn jwt_secret(&self) -> String {
        if let Some(ref secret) = self.jwt_secret {
            secret.clone()
        } else if self.dev_mode {
            "dev-mode-secret-not-for-production-use-123456".to_string()
        } else {
            String::new()
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            min_idle: self.db_pool_min_idle,
            max_size: self.db_pool_max_size,
            connect_timeout: Duration::from_secs(self.db_connect_timeout_secs),
        }
    }

    /// Username and password of the bootstrap admin, when both are set
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.bootstrap_admin_username, &self.bootstrap_admin_password) {
            (Some(user), Some(pass)) if !user.trim().is_empty() => Some((user.trim(), pass)),
            _ => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                _ => {}
            }
        }

        if self.db_pool_max_size == 0 {
            return Err("DB_POOL_MAX_SIZE must be at least 1".to_string());
        }

        if self.db_pool_min_idle > self.db_pool_max_size {
            return Err("DB_POOL_MIN_IDLE must be less than or equal to DB_POOL_MAX_SIZE".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_mode_needs_no_secret() {
        let args = Args::parse_from(["accolade", "--dev-mode"]);
        assert!(args.validate().is_ok());
        assert!(args.jwt_secret().len() >= 32);
        assert_eq!(args.jwt_expiry_seconds, 7200);
        assert_eq!(args.refresh_expiry_seconds, 259200);
    }

    #[test]
    fn test_production_requires_long_secret() {
        let args = Args::parse_from(["accolade", "--jwt-secret", "short"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from([
            "accolade",
            "--jwt-secret",
            "0123456789abcdef0123456789abcdef",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_pool_bounds() {
        let args = Args::parse_from([
            "accolade",
            "--dev-mode",
            "--db-pool-min-idle",
            "30",
            "--db-pool-max-size",
            "10",
        ]);
        assert!(args.validate().is_err());
    }
}
