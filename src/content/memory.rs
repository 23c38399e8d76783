//! In-memory content store
//!
//! Used when running in dev mode without MongoDB, and by tests.

use bson::oid::ObjectId;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::{AchievementContent, Attachment, ContentPatch, ContentStore, NewContent};
use crate::types::{AppError, Result};

#[derive(Clone, Default)]
pub struct MemoryContentStore {
    docs: Arc<DashMap<String, AchievementContent>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents, soft-deleted ones included
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of documents not marked deleted
    pub fn live_len(&self) -> usize {
        self.docs.iter().filter(|d| !d.deleted).count()
    }

    /// Raw document regardless of its deleted flag
    pub fn get_raw(&self, id: &str) -> Option<AchievementContent> {
        self.docs.get(id).map(|d| d.value().clone())
    }

    fn not_found(id: &str) -> AppError {
        AppError::NotFound(format!("Content {} not found", id))
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryContentStore {
    async fn insert(&self, content: NewContent) -> Result<String> {
        let id = ObjectId::new().to_hex();
        self.docs
            .insert(id.clone(), content.into_content(id.clone(), Utc::now()));
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<AchievementContent>> {
        Ok(self
            .docs
            .get(id)
            .filter(|d| !d.deleted)
            .map(|d| d.value().clone()))
    }

    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, AchievementContent>> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.docs
                    .get(id)
                    .filter(|d| !d.deleted)
                    .map(|d| (id.clone(), d.value().clone()))
            })
            .collect())
    }

    async fn update_fields(&self, id: &str, patch: &ContentPatch) -> Result<()> {
        let mut doc = self
            .docs
            .get_mut(id)
            .filter(|d| !d.deleted)
            .ok_or_else(|| Self::not_found(id))?;
        patch.apply(&mut doc, Utc::now());
        Ok(())
    }

    async fn append_attachment(&self, id: &str, attachment: Attachment) -> Result<()> {
        // The shard write lock is held for the whole push
        let mut doc = self
            .docs
            .get_mut(id)
            .filter(|d| !d.deleted)
            .ok_or_else(|| Self::not_found(id))?;
        doc.attachments.push(attachment);
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_deleted(&self, id: &str) -> Result<()> {
        let mut doc = self.docs.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        doc.deleted = true;
        doc.updated_at = Utc::now();
        Ok(())
    }
}
