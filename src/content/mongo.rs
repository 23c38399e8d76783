//! MongoDB-backed content store

use bson::{doc, oid::ObjectId, DateTime, Document};
use std::collections::HashMap;
use tracing::debug;

use super::{AchievementContent, Attachment, ContentPatch, ContentStore, NewContent};
use crate::db::schemas::{AchievementDoc, AttachmentDoc, ACHIEVEMENT_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{AppError, Result};

pub struct MongoContentStore {
    collection: MongoCollection<AchievementDoc>,
}

impl MongoContentStore {
    /// Open the `achievements` collection and apply its indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo
            .collection::<AchievementDoc>(ACHIEVEMENT_COLLECTION)
            .await?;
        Ok(Self { collection })
    }

    fn parse_id(id: &str) -> Result<ObjectId> {
        ObjectId::parse_str(id).map_err(|_| AppError::NotFound(format!("Content {} not found", id)))
    }
}

/// Filter for one document not flagged `deleted`
fn live(oid: ObjectId) -> Document {
    doc! { "_id": oid, "deleted": { "$ne": true } }
}

/// `$set` document for the fields present in `patch`
fn patch_to_set(patch: &ContentPatch) -> Result<Document> {
    let now = DateTime::now();
    let mut set = doc! { "updatedAt": now, "metadata.updated_at": now };

    if let Some(title) = &patch.title {
        set.insert("title", title.as_str());
    }
    if let Some(description) = &patch.description {
        set.insert("description", description.as_str());
    }
    if let Some(kind) = &patch.achievement_type {
        set.insert("achievementType", kind.as_str());
    }
    if let Some(points) = patch.points {
        set.insert("points", points);
    }
    if let Some(tags) = &patch.tags {
        set.insert("tags", super::normalize_tags(tags.clone()));
    }
    if let Some(details) = &patch.details {
        set.insert("details", bson::to_bson(details)?);
    }

    Ok(set)
}

#[async_trait::async_trait]
impl ContentStore for MongoContentStore {
    async fn insert(&self, content: NewContent) -> Result<String> {
        let oid = self
            .collection
            .insert_one(AchievementDoc::from_new(content))
            .await?;
        debug!(content_id = %oid, "Achievement content inserted");
        Ok(oid.to_hex())
    }

    async fn get(&self, id: &str) -> Result<Option<AchievementContent>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        Ok(self
            .collection
            .find_one(live(oid))
            .await?
            .map(AchievementDoc::into_content))
    }

    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, AchievementContent>> {
        let oids: Vec<ObjectId> = ids
            .iter()
            .filter_map(|id| ObjectId::parse_str(id).ok())
            .collect();
        if oids.is_empty() {
            return Ok(HashMap::new());
        }

        let docs = self
            .collection
            .find_many(doc! { "_id": { "$in": oids }, "deleted": { "$ne": true } })
            .await?;

        Ok(docs
            .into_iter()
            .map(AchievementDoc::into_content)
            .map(|c| (c.id.clone(), c))
            .collect())
    }

    async fn update_fields(&self, id: &str, patch: &ContentPatch) -> Result<()> {
        let oid = Self::parse_id(id)?;
        let result = self
            .collection
            .update_one(live(oid), doc! { "$set": patch_to_set(patch)? })
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Content {} not found", id)));
        }
        Ok(())
    }

    async fn append_attachment(&self, id: &str, attachment: Attachment) -> Result<()> {
        let oid = Self::parse_id(id)?;
        let entry = bson::to_bson(&AttachmentDoc::from(attachment))?;
        let now = DateTime::now();

        let result = self
            .collection
            .update_one(
                live(oid),
                doc! {
                    "$push": { "attachments": entry },
                    "$set": { "updatedAt": now, "metadata.updated_at": now },
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Content {} not found", id)));
        }
        Ok(())
    }

    async fn mark_deleted(&self, id: &str) -> Result<()> {
        let oid = Self::parse_id(id)?;
        let now = DateTime::now();
        let result = self
            .collection
            .update_one(
                live(oid),
                doc! {
                    "$set": {
                        "deleted": true,
                        "updatedAt": now,
                        "metadata.is_deleted": true,
                        "metadata.deleted_at": now,
                        "metadata.updated_at": now,
                    }
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Content {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{DetailValue, Details};

    // Round trips against a live server are covered by the in-memory store;
    // these check the update documents sent to MongoDB.

    #[test]
    fn test_patch_only_sets_present_fields() {
        let patch = ContentPatch {
            title: Some("Hackathon Finals".into()),
            points: Some(75),
            ..Default::default()
        };
        let set = patch_to_set(&patch).unwrap();

        assert_eq!(set.get_str("title").unwrap(), "Hackathon Finals");
        assert_eq!(set.get_i64("points").unwrap(), 75);
        assert!(set.contains_key("updatedAt"));
        assert!(set.contains_key("metadata.updated_at"));
        assert!(!set.contains_key("description"));
        assert!(!set.contains_key("attachments"));
    }

    #[test]
    fn test_patch_details_become_subdocument() {
        let mut details = Details::new();
        details.insert("organizer".into(), DetailValue::Text("Kominfo".into()));
        let patch = ContentPatch {
            details: Some(details),
            ..Default::default()
        };

        let set = patch_to_set(&patch).unwrap();
        assert_eq!(
            set.get_document("details").unwrap().get_str("organizer").unwrap(),
            "Kominfo"
        );
    }
}
