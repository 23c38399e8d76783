//! Accolade - student achievement reporting backend
//!
//! Students record achievements and submit them; their assigned advisor (or
//! an admin) verifies or rejects them. Workflow state, identities and the
//! transition log live in SQLite; the free-form achievement payload lives in
//! MongoDB.
//!
//! ## Layout
//!
//! - [`types`] workflow types and [`types::AppError`]
//! - [`db`] relational store (diesel) and MongoDB plumbing
//! - [`content`] content-store trait with MongoDB and in-memory backends
//! - [`repository`] composes both stores
//! - [`services`] role and ownership rules, the status state machine
//! - [`routes`] and [`server`] the hyper HTTP surface

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod repository;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod uploads;

pub use config::Args;
pub use types::{AppError, Result};
