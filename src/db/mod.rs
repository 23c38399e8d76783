//! Storage for Accolade
//!
//! ## Architecture
//!
//! - Identities, workflow references and the transition log live in SQLite
//!   (Diesel + r2d2 pool)
//! - Achievement content documents live in MongoDB (see [`crate::content`])
//!
//! ## Tables
//!
//! - `roles` - Role names keyed by generated ids
//! - `users` - Accounts (soft-deleted through `is_active`)
//! - `students` / `advisors` - Profiles linked to users; students point at their advisor
//! - `achievement_references` - Status and verification metadata per achievement
//! - `achievement_histories` - Append-only status transitions

pub mod diesel_schema;
pub mod history;
pub mod identity;
pub mod models;
pub mod mongo;
pub mod references;
pub mod schemas;

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use tracing::{debug, info};

use crate::types::{AppError, Result};

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Current time as an RFC 3339 string with microsecond precision.
///
/// Fixed width and always UTC, so lexical order equals chronological order.
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Generated primary key for text-keyed tables
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Pool sizing and timeouts
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub min_idle: u32,
    pub max_size: u32,
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_idle: 5,
            max_size: 20,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-connection pragmas. SQLite leaves foreign keys off unless asked.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Pooled relational database
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database at `url` and make sure every table exists
    pub fn connect(url: &str, settings: &PoolSettings) -> Result<Self> {
        info!("Opening SQLite database at {}", url);

        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder()
            .max_size(settings.max_size.max(1))
            .min_idle(Some(settings.min_idle.min(settings.max_size)))
            .connection_timeout(settings.connect_timeout)
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout: settings.connect_timeout,
            }))
            .build(manager)
            .map_err(|e| AppError::Database(format!("Failed to build pool: {}", e)))?;

        let db = Self { pool };
        {
            let mut conn = db.conn()?;
            conn.batch_execute("PRAGMA journal_mode = WAL;")
                .map_err(|e| AppError::Database(format!("Failed to set PRAGMA: {}", e)))?;
            init_tables(&mut conn)?;
        }

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run blocking Diesel work on the blocking thread pool
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }

    /// Run `f` inside a single transaction
    pub async fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(move |conn| conn.transaction::<T, AppError, _>(|conn| f(conn)))
            .await
    }
}

/// Create every table and index if missing
pub fn init_tables(conn: &mut SqliteConnection) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY NOT NULL,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            full_name TEXT NOT NULL,
            role_id TEXT NOT NULL REFERENCES roles(id),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS advisors (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL UNIQUE REFERENCES users(id),
            lecturer_number TEXT NOT NULL UNIQUE,
            department TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL UNIQUE REFERENCES users(id),
            student_number TEXT NOT NULL UNIQUE,
            program_study TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            advisor_id TEXT REFERENCES advisors(id),
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS achievement_references (
            id TEXT PRIMARY KEY NOT NULL,
            student_id TEXT NOT NULL REFERENCES students(user_id),
            content_ref TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('DRAFT', 'PENDING', 'VERIFIED', 'REJECTED')),
            rejection_note TEXT,
            verified_by TEXT,
            verified_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS achievement_histories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            achievement_id TEXT NOT NULL REFERENCES achievement_references(id) ON DELETE CASCADE,
            changed_by TEXT NOT NULL,
            previous_status TEXT NOT NULL,
            new_status TEXT NOT NULL,
            remarks TEXT,
            created_at TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_references_student ON achievement_references(student_id)",
        "CREATE INDEX IF NOT EXISTS idx_references_created ON achievement_references(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_histories_achievement ON achievement_histories(achievement_id)",
        "CREATE INDEX IF NOT EXISTS idx_students_advisor ON students(advisor_id)",
    ];

    for statement in statements {
        diesel::sql_query(statement)
            .execute(conn)
            .map_err(|e| AppError::Database(format!("Failed to initialize schema: {}", e)))?;
    }

    debug!("Relational tables initialized");
    Ok(())
}

/// In-memory connection with the schema applied, for unit tests
#[cfg(test)]
pub(crate) fn test_connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").unwrap();
    conn.batch_execute("PRAGMA foreign_keys = ON;").unwrap();
    init_tables(&mut conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_lexically() {
        let a = current_timestamp();
        std::thread::sleep(Duration::from_millis(2));
        let b = current_timestamp();
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn test_init_tables_is_idempotent() {
        let mut conn = test_connection();
        init_tables(&mut conn).unwrap();
    }

    #[tokio::test]
    async fn test_pool_runs_transactions() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("accolade.db");
        let settings = PoolSettings {
            min_idle: 1,
            max_size: 2,
            connect_timeout: Duration::from_secs(5),
        };
        let db = Database::connect(url.to_str().unwrap(), &settings).unwrap();

        let result: Result<()> = db
            .transaction(|conn| {
                identity::insert_role(conn, "r-1", "Admin", None)?;
                Err(AppError::Internal("boom".into()))
            })
            .await;
        assert!(result.is_err());

        let roles = db.run(|conn| identity::list_roles(conn)).await.unwrap();
        assert!(roles.is_empty(), "rolled back insert must not be visible");
    }
}
