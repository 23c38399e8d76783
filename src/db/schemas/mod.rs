//! MongoDB document schemas

pub mod achievement;
pub mod metadata;

pub use achievement::{AchievementDoc, AttachmentDoc, ACHIEVEMENT_COLLECTION};
pub use metadata::Metadata;
