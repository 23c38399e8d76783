//! Shared types for Accolade

pub mod achievement;
pub mod error;

pub use achievement::{
    AchievementHistory, AchievementReference, AchievementStatus, HistoryEntry, StatusChange,
    NO_PREVIOUS_STATUS,
};
pub use error::{AppError, Result};
