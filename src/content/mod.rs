//! Achievement content store
//!
//! The variable-shaped half of an achievement (title, description, tags,
//! points, attachments and an open `details` map) lives in a document store.
//! [`ContentStore`] is implemented by:
//!
//! - [`MongoContentStore`] - the `achievements` collection in MongoDB
//! - [`MemoryContentStore`] - a DashMap, used in dev mode without MongoDB and in tests
//!
//! Attachment appends are atomic per document in both implementations, so
//! concurrent uploads never overwrite each other.

pub mod memory;
pub mod mongo;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::types::Result;

pub use memory::MemoryContentStore;
pub use mongo::MongoContentStore;

/// Value in the open `details` map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<DetailValue>),
    Map(BTreeMap<String, DetailValue>),
}

pub type Details = BTreeMap<String, DetailValue>;

/// Metadata of one uploaded evidence file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Stored achievement content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementContent {
    pub id: String,
    pub student_id: String,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    pub details: Details,
    pub attachments: Vec<Attachment>,
    pub tags: Vec<String>,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

/// Content to insert. Absent collections are stored empty.
#[derive(Debug, Clone, Default)]
pub struct NewContent {
    pub student_id: String,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    pub details: Option<Details>,
    pub attachments: Option<Vec<Attachment>>,
    pub tags: Option<Vec<String>>,
    pub points: i64,
}

impl NewContent {
    /// Normalized content with the given id and timestamps
    pub fn into_content(self, id: String, now: DateTime<Utc>) -> AchievementContent {
        AchievementContent {
            id,
            student_id: self.student_id,
            achievement_type: self.achievement_type,
            title: self.title,
            description: self.description,
            details: self.details.unwrap_or_default(),
            attachments: self.attachments.unwrap_or_default(),
            tags: normalize_tags(self.tags.unwrap_or_default()),
            points: self.points,
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }
}

/// Partial update of editable fields; attachments are never touched here
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub achievement_type: Option<String>,
    pub points: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub details: Option<Details>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.achievement_type.is_none()
            && self.points.is_none()
            && self.tags.is_none()
            && self.details.is_none()
    }

    /// Apply onto an in-memory copy
    pub fn apply(&self, content: &mut AchievementContent, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            content.title = title.clone();
        }
        if let Some(description) = &self.description {
            content.description = description.clone();
        }
        if let Some(kind) = &self.achievement_type {
            content.achievement_type = kind.clone();
        }
        if let Some(points) = self.points {
            content.points = points;
        }
        if let Some(tags) = &self.tags {
            content.tags = normalize_tags(tags.clone());
        }
        if let Some(details) = &self.details {
            content.details = details.clone();
        }
        content.updated_at = now;
    }
}

/// Trim, drop blanks and keep the first occurrence of each tag
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !seen.iter().any(|t: &String| t == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

/// Document store holding achievement content
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert and return the generated id
    async fn insert(&self, content: NewContent) -> Result<String>;

    /// Live (not soft-deleted) content by id
    async fn get(&self, id: &str) -> Result<Option<AchievementContent>>;

    /// Live content for several ids, keyed by id; unknown ids are skipped
    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, AchievementContent>>;

    /// Apply a partial update and refresh `updated_at`; `NotFound` if missing
    async fn update_fields(&self, id: &str, patch: &ContentPatch) -> Result<()>;

    /// Atomically append one attachment and refresh `updated_at`
    async fn append_attachment(&self, id: &str, attachment: Attachment) -> Result<()>;

    /// Soft-delete; later reads no longer return the document
    async fn mark_deleted(&self, id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_collections_become_empty() {
        let content = NewContent {
            student_id: "s".into(),
            achievement_type: "competition".into(),
            title: "Hackathon".into(),
            ..Default::default()
        }
        .into_content("id".into(), Utc::now());

        assert!(content.details.is_empty());
        assert!(content.attachments.is_empty());
        assert!(content.tags.is_empty());
        assert!(!content.deleted);

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["attachments"], serde_json::json!([]));
        assert_eq!(json["tags"], serde_json::json!([]));
        assert_eq!(json["achievementType"], "competition");
    }

    #[test]
    fn test_tags_are_set_like() {
        let tags = normalize_tags(vec![
            " ai ".into(),
            "ai".into(),
            "".into(),
            "national".into(),
        ]);
        assert_eq!(tags, vec!["ai".to_string(), "national".to_string()]);
    }

    #[test]
    fn test_detail_values_keep_their_types() {
        let details: Details = serde_json::from_value(serde_json::json!({
            "rank": 1,
            "score": 97.5,
            "team": ["sinta", "budi"],
            "venue": { "city": "Bandung", "online": false },
            "sponsor": null
        }))
        .unwrap();

        assert_eq!(details["rank"], DetailValue::Integer(1));
        assert_eq!(details["score"], DetailValue::Float(97.5));
        assert_eq!(details["sponsor"], DetailValue::Null);
        assert!(matches!(&details["team"], DetailValue::List(items) if items.len() == 2));
        match &details["venue"] {
            DetailValue::Map(venue) => assert_eq!(venue["online"], DetailValue::Bool(false)),
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn test_patch_leaves_attachments_alone() {
        let now = Utc::now();
        let mut content = NewContent {
            title: "Old".into(),
            attachments: Some(vec![Attachment {
                file_name: "cert.pdf".into(),
                file_url: "/uploads/cert.pdf".into(),
                file_type: "application/pdf".into(),
                uploaded_at: now,
            }]),
            ..Default::default()
        }
        .into_content("id".into(), now);

        let patch = ContentPatch {
            title: Some("New".into()),
            points: Some(40),
            ..Default::default()
        };
        patch.apply(&mut content, now);

        assert_eq!(content.title, "New");
        assert_eq!(content.points, 40);
        assert_eq!(content.attachments.len(), 1);
        assert!(ContentPatch::default().is_empty());
    }
}
