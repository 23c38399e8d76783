//! Achievement content document

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::metadata::Metadata;
use crate::content::{AchievementContent, Attachment, Details, NewContent};
use crate::db::mongo::{IntoIndexes, MutMetadata};

pub const ACHIEVEMENT_COLLECTION: &str = "achievements";

/// Attachment entry as stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDoc {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: DateTime,
}

impl From<Attachment> for AttachmentDoc {
    fn from(a: Attachment) -> Self {
        Self {
            file_name: a.file_name,
            file_url: a.file_url,
            file_type: a.file_type,
            uploaded_at: DateTime::from_chrono(a.uploaded_at),
        }
    }
}

impl From<AttachmentDoc> for Attachment {
    fn from(a: AttachmentDoc) -> Self {
        Self {
            file_name: a.file_name,
            file_url: a.file_url,
            file_type: a.file_type,
            uploaded_at: a.uploaded_at.to_chrono(),
        }
    }
}

/// Achievement content in the `achievements` collection
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student_id: String,
    pub achievement_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: Details,
    #[serde(default)]
    pub attachments: Vec<AttachmentDoc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl AchievementDoc {
    /// Document for a new achievement, collections already normalized
    pub fn from_new(new: NewContent) -> Self {
        let now = Utc::now();
        let content = new.into_content(String::new(), now);
        Self {
            id: None,
            student_id: content.student_id,
            achievement_type: content.achievement_type,
            title: content.title,
            description: content.description,
            details: content.details,
            attachments: content.attachments.into_iter().map(AttachmentDoc::from).collect(),
            tags: content.tags,
            points: content.points,
            created_at: Some(DateTime::from_chrono(now)),
            updated_at: Some(DateTime::from_chrono(now)),
            deleted: false,
            metadata: Metadata::new(),
        }
    }

    /// Top-level `createdAt`/`updatedAt`/`deleted` win; documents written
    /// without them fall back to the metadata block.
    pub fn into_content(self) -> AchievementContent {
        let created_at = self
            .created_at
            .or(self.metadata.created_at)
            .map(|d| d.to_chrono())
            .unwrap_or_else(Utc::now);
        let updated_at = self
            .updated_at
            .or(self.metadata.updated_at)
            .map(|d| d.to_chrono())
            .unwrap_or(created_at);

        AchievementContent {
            id: self.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            student_id: self.student_id,
            achievement_type: self.achievement_type,
            title: self.title,
            description: self.description,
            details: self.details,
            attachments: self.attachments.into_iter().map(Attachment::from).collect(),
            tags: self.tags,
            points: self.points,
            created_at,
            updated_at,
            deleted: self.deleted || self.metadata.is_deleted,
        }
    }
}

impl IntoIndexes for AchievementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "studentId": 1 },
                Some(
                    IndexOptions::builder()
                        .name(Some("student_id_index".to_string()))
                        .build(),
                ),
            ),
            (
                doc! { "achievementType": 1 },
                Some(
                    IndexOptions::builder()
                        .name(Some("achievement_type_index".to_string()))
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for AchievementDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
