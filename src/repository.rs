//! Achievement repository
//!
//! Mediates between the reference store and the history log (SQLite) and the
//! content store (MongoDB or memory). Relational writes that belong together
//! run in one transaction. The two stores cannot share a transaction, so
//! creation writes content first and soft-deletes it again when the
//! relational half fails.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, warn};

use crate::content::{AchievementContent, Attachment, ContentPatch, ContentStore, NewContent};
use crate::db::references::{self, ReferenceScope};
use crate::db::{history, Database};
use crate::types::{
    AchievementHistory, AchievementReference, AchievementStatus, AppError, HistoryEntry, Result,
    StatusChange,
};

#[derive(Clone)]
pub struct AchievementRepository {
    db: Database,
    content: Arc<dyn ContentStore>,
}

impl AchievementRepository {
    pub fn new(db: Database, content: Arc<dyn ContentStore>) -> Self {
        Self { db, content }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Content
    // =========================================================================

    pub async fn create_content(&self, content: NewContent) -> Result<String> {
        self.content.insert(content).await
    }

    pub async fn get_content(&self, content_id: &str) -> Result<Option<AchievementContent>> {
        self.content.get(content_id).await
    }

    pub async fn get_contents(&self, content_ids: &[String]) -> Result<HashMap<String, AchievementContent>> {
        self.content.get_many(content_ids).await
    }

    pub async fn update_content(&self, content_id: &str, patch: &ContentPatch) -> Result<()> {
        self.content.update_fields(content_id, patch).await
    }

    pub async fn append_attachment(&self, content_id: &str, attachment: Attachment) -> Result<()> {
        self.content.append_attachment(content_id, attachment).await
    }

    pub async fn delete_content(&self, content_id: &str) -> Result<()> {
        self.content.mark_deleted(content_id).await
    }

    // =========================================================================
    // References
    // =========================================================================

    /// Insert a DRAFT reference pointing at `content_id`
    pub async fn create_reference(&self, student_id: &str, content_id: &str) -> Result<AchievementReference> {
        let student_id = student_id.to_string();
        let content_id = content_id.to_string();
        self.db
            .run(move |conn| references::insert_reference(conn, &student_id, &content_id))
            .await
    }

    pub async fn get_reference(&self, id: &str) -> Result<AchievementReference> {
        let id = id.to_string();
        self.db
            .run(move |conn| {
                references::get_reference(conn, &id)?
                    .ok_or_else(|| AppError::NotFound(format!("Achievement {} not found", id)))
            })
            .await
    }

    pub async fn list_references(&self, scope: ReferenceScope) -> Result<Vec<AchievementReference>> {
        self.db
            .run(move |conn| references::list_references(conn, &scope))
            .await
    }

    pub async fn list_references_for_student(&self, student_id: &str) -> Result<Vec<AchievementReference>> {
        self.list_references(ReferenceScope::Student(student_id.to_string()))
            .await
    }

    pub async fn list_references_for_advisor_of(
        &self,
        advisor_user_id: &str,
    ) -> Result<Vec<AchievementReference>> {
        self.list_references(ReferenceScope::AdvisorOf(advisor_user_id.to_string()))
            .await
    }

    pub async fn list_all_references(&self) -> Result<Vec<AchievementReference>> {
        self.list_references(ReferenceScope::All).await
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: AchievementStatus,
        rejection_note: Option<String>,
    ) -> Result<()> {
        let id = id.to_string();
        self.db
            .run(move |conn| references::set_status(conn, &id, status, rejection_note.as_deref()))
            .await
    }

    pub async fn set_verified(&self, id: &str, verifier_id: &str) -> Result<()> {
        let id = id.to_string();
        let verifier_id = verifier_id.to_string();
        self.db
            .run(move |conn| references::set_verified(conn, &id, &verifier_id))
            .await
    }

    pub async fn touch_reference(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db.run(move |conn| references::touch(conn, &id)).await
    }

    /// Remove the reference row; its content document is left in place
    pub async fn delete_reference(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .run(move |conn| references::delete_reference(conn, &id))
            .await
    }

    /// Remove the reference row, refusing once it has left DRAFT
    pub async fn delete_draft_reference(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .run(move |conn| references::delete_draft_reference(conn, &id))
            .await
    }

    /// Refresh `updated_at`, refusing unless the reference is DRAFT or REJECTED
    pub async fn touch_editable_reference(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .run(move |conn| references::touch_editable(conn, &id))
            .await
    }

    pub async fn is_advisor_of(&self, reference_id: &str, advisor_user_id: &str) -> Result<bool> {
        let reference_id = reference_id.to_string();
        let advisor_user_id = advisor_user_id.to_string();
        self.db
            .run(move |conn| references::is_advisor_of(conn, &reference_id, &advisor_user_id))
            .await
    }

    pub async fn statuses(&self, scope: ReferenceScope) -> Result<Vec<AchievementStatus>> {
        self.db
            .run(move |conn| references::statuses(conn, &scope))
            .await
    }

    // =========================================================================
    // History
    // =========================================================================

    pub async fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        self.db
            .run(move |conn| history::append_history(conn, &entry))
            .await
    }

    /// Transitions of one achievement, newest first
    pub async fn get_history(&self, achievement_id: &str) -> Result<Vec<AchievementHistory>> {
        let achievement_id = achievement_id.to_string();
        self.db
            .run(move |conn| history::get_history(conn, &achievement_id))
            .await
    }

    // =========================================================================
    // Composite operations
    // =========================================================================

    /// Create content, then the DRAFT reference and its first history row.
    ///
    /// If the relational write fails the content is soft-deleted and the
    /// original error is returned.
    pub async fn create_achievement(
        &self,
        content: NewContent,
        changed_by: &str,
        remarks: Option<String>,
    ) -> Result<(AchievementReference, AchievementContent)> {
        let student_id = content.student_id.clone();
        let content_id = self.content.insert(content).await?;

        let changed_by = changed_by.to_string();
        let content_ref = content_id.clone();
        let created = self
            .db
            .transaction(move |conn| {
                let reference = references::insert_reference(conn, &student_id, &content_ref)?;
                history::append_history(
                    conn,
                    &HistoryEntry {
                        achievement_id: reference.id.clone(),
                        changed_by,
                        previous_status: None,
                        new_status: AchievementStatus::Draft,
                        remarks,
                    },
                )?;
                Ok(reference)
            })
            .await;

        let reference = match created {
            Ok(reference) => reference,
            Err(err) => {
                warn!(content_id = %content_id, error = %err, "Reference write failed, removing content");
                if let Err(cleanup) = self.content.mark_deleted(&content_id).await {
                    error!(
                        content_id = %content_id,
                        error = %cleanup,
                        "Failed to remove content after reference write failure"
                    );
                }
                return Err(err);
            }
        };

        let content = self
            .content
            .get(&content_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Content {} vanished after insert", content_id)))?;

        Ok((reference, content))
    }

    /// Apply a guarded status change and append its history row atomically
    pub async fn transition(
        &self,
        id: &str,
        change: StatusChange,
        changed_by: &str,
        remarks: Option<String>,
    ) -> Result<AchievementReference> {
        let id = id.to_string();
        let changed_by = changed_by.to_string();
        self.db
            .transaction(move |conn| {
                references::apply_status_change(conn, &id, &change)?;
                history::append_history(
                    conn,
                    &HistoryEntry {
                        achievement_id: id.clone(),
                        changed_by,
                        previous_status: Some(change.expected),
                        new_status: change.status,
                        remarks,
                    },
                )?;
                references::get_reference(conn, &id)?
                    .ok_or_else(|| AppError::NotFound(format!("Achievement {} not found", id)))
            })
            .await
    }
}
