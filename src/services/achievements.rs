//! Achievement workflow service
//!
//! Enforces who may do what to an achievement and the status state machine
//! (see [`AchievementStatus::can_transition_to`]). Authorization is checked
//! before the state machine, so a caller without rights always gets
//! `Forbidden` regardless of the record's status.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::required;
use crate::auth::Identity;
use crate::content::{
    AchievementContent, Attachment, ContentPatch, Details, NewContent,
};
use crate::db::identity as identity_db;
use crate::db::references::ReferenceScope;
use crate::repository::AchievementRepository;
use crate::types::{
    AchievementHistory, AchievementReference, AchievementStatus, AppError, Result, StatusChange,
};
use crate::uploads::{UploadStore, UploadedFile};

/// Fields of a new achievement
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAchievementInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub achievement_type: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub details: Option<Details>,
}

/// Reference plus its content, as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct AchievementView {
    pub ref_id: String,
    pub student_id: String,
    pub status: AchievementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub content: Option<AchievementContent>,
}

impl AchievementView {
    fn new(reference: AchievementReference, content: Option<AchievementContent>) -> Self {
        Self {
            ref_id: reference.id,
            student_id: reference.student_id,
            status: reference.status,
            rejection_note: reference.rejection_note,
            verified_by: reference.verified_by,
            verified_at: reference.verified_at,
            created_at: reference.created_at,
            updated_at: reference.updated_at,
            content,
        }
    }
}

fn validate_points(points: i64) -> Result<()> {
    if points < 0 {
        return Err(AppError::Validation("points must not be negative".into()));
    }
    Ok(())
}

pub struct AchievementService {
    repo: AchievementRepository,
    uploads: UploadStore,
}

impl AchievementService {
    pub fn new(repo: AchievementRepository, uploads: UploadStore) -> Self {
        Self { repo, uploads }
    }

    pub fn repository(&self) -> &AchievementRepository {
        &self.repo
    }

    // =========================================================================
    // Access checks
    // =========================================================================

    async fn can_view(&self, identity: &Identity, reference: &AchievementReference) -> Result<bool> {
        if identity.is_admin() {
            return Ok(true);
        }
        if identity.is_student() {
            return Ok(reference.student_id == identity.user_id);
        }
        self.repo
            .is_advisor_of(&reference.id, &identity.user_id)
            .await
    }

    /// Reference `id` if the caller may see it
    async fn load_visible(&self, identity: &Identity, id: &str) -> Result<AchievementReference> {
        let reference = self.repo.get_reference(id).await?;
        if !self.can_view(identity, &reference).await? {
            warn!(user_id = %identity.user_id, achievement_id = %id, "Access to achievement refused");
            return Err(AppError::Forbidden(
                "You do not have access to this achievement".into(),
            ));
        }
        Ok(reference)
    }

    fn require_owner(identity: &Identity, reference: &AchievementReference, action: &str) -> Result<()> {
        if identity.is_student() && reference.student_id == identity.user_id {
            return Ok(());
        }
        warn!(
            user_id = %identity.user_id,
            achievement_id = %reference.id,
            action,
            "Owner-only action refused"
        );
        Err(AppError::Forbidden(format!(
            "Only the owning student can {} this achievement",
            action
        )))
    }

    /// Admin, or the registered advisor of the owning student
    async fn require_verifier(&self, identity: &Identity, reference: &AchievementReference) -> Result<()> {
        if identity.is_admin() {
            return Ok(());
        }
        if identity.is_advisor()
            && self
                .repo
                .is_advisor_of(&reference.id, &identity.user_id)
                .await?
        {
            return Ok(());
        }
        warn!(user_id = %identity.user_id, achievement_id = %reference.id, "Verification refused");
        Err(AppError::Forbidden(
            "Only the student's advisor or an admin can verify this achievement".into(),
        ))
    }

    fn require_transition(reference: &AchievementReference, next: AchievementStatus) -> Result<()> {
        if reference.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::BusinessRule(format!(
                "Cannot move achievement from {} to {}",
                reference.status, next
            )))
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Views for every reference under `scope`, newest first
    pub async fn views_for_scope(&self, scope: ReferenceScope) -> Result<Vec<AchievementView>> {
        let references = self.repo.list_references(scope).await?;
        let ids: Vec<String> = references.iter().map(|r| r.content_ref.clone()).collect();
        let mut contents = self.repo.get_contents(&ids).await?;

        Ok(references
            .into_iter()
            .map(|r| {
                let content = contents.remove(&r.content_ref);
                AchievementView::new(r, content)
            })
            .collect())
    }

    /// Achievements visible to the caller
    pub async fn list(&self, identity: &Identity) -> Result<Vec<AchievementView>> {
        let scope = if identity.is_admin() {
            ReferenceScope::All
        } else if identity.is_student() {
            ReferenceScope::Student(identity.user_id.clone())
        } else {
            ReferenceScope::AdvisorOf(identity.user_id.clone())
        };
        self.views_for_scope(scope).await
    }

    pub async fn get(&self, identity: &Identity, id: &str) -> Result<AchievementView> {
        let reference = self.load_visible(identity, id).await?;
        let content = self.repo.get_content(&reference.content_ref).await?;
        Ok(AchievementView::new(reference, content))
    }

    pub async fn history(&self, identity: &Identity, id: &str) -> Result<Vec<AchievementHistory>> {
        let reference = self.load_visible(identity, id).await?;
        self.repo.get_history(&reference.id).await
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a DRAFT achievement owned by the calling student
    pub async fn create(
        &self,
        identity: &Identity,
        input: CreateAchievementInput,
        file: Option<UploadedFile>,
    ) -> Result<AchievementView> {
        if !identity.is_student() {
            return Err(AppError::Forbidden("Only students can create achievements".into()));
        }

        let title = required("title", &input.title)?;
        let achievement_type = required("achievement_type", &input.achievement_type)?;
        validate_points(input.points)?;

        let user_id = identity.user_id.clone();
        let profile = self
            .repo
            .database()
            .run(move |conn| identity_db::get_student_by_user(conn, &user_id))
            .await?;
        if profile.is_none() {
            return Err(AppError::BusinessRule(
                "Account has no student profile".into(),
            ));
        }

        let saved = match file {
            Some(file) => Some(self.uploads.save(&identity.user_id, &file).await?),
            None => None,
        };
        let attachments = saved.clone().map(|attachment| vec![attachment]);

        let created = self
            .repo
            .create_achievement(
                NewContent {
                    student_id: identity.user_id.clone(),
                    achievement_type,
                    title,
                    description: input.description.trim().to_string(),
                    details: input.details,
                    attachments,
                    tags: Some(input.tags),
                    points: input.points,
                },
                &identity.user_id,
                Some("Achievement created".into()),
            )
            .await;

        let (reference, content) = match created {
            Ok(created) => created,
            Err(err) => {
                if let Some(attachment) = &saved {
                    self.discard_upload(attachment).await;
                }
                return Err(err);
            }
        };

        info!(achievement_id = %reference.id, student_id = %reference.student_id, "Achievement created");
        Ok(AchievementView::new(reference, Some(content)))
    }

    /// Edit content while the achievement is DRAFT or REJECTED
    pub async fn update(&self, identity: &Identity, id: &str, patch: ContentPatch) -> Result<AchievementView> {
        let reference = self.repo.get_reference(id).await?;
        Self::require_owner(identity, &reference, "edit")?;

        if !reference.status.is_editable() {
            return Err(AppError::BusinessRule(format!(
                "Achievement is {} and can no longer be edited",
                reference.status
            )));
        }
        if patch.is_empty() {
            return Err(AppError::Validation("No fields to update".into()));
        }
        if let Some(title) = &patch.title {
            required("title", title)?;
        }
        if let Some(kind) = &patch.achievement_type {
            required("achievement_type", kind)?;
        }
        if let Some(points) = patch.points {
            validate_points(points)?;
        }

        // Fails if a submit landed since the status was read
        self.repo.touch_editable_reference(&reference.id).await?;
        self.repo.update_content(&reference.content_ref, &patch).await?;

        self.get(identity, id).await
    }

    /// Remove a DRAFT achievement
    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<()> {
        let reference = self.repo.get_reference(id).await?;
        Self::require_owner(identity, &reference, "delete")?;

        if reference.status != AchievementStatus::Draft {
            return Err(AppError::BusinessRule(
                "Only DRAFT achievements can be deleted".into(),
            ));
        }

        self.repo.delete_draft_reference(&reference.id).await?;

        if let Err(e) = self.repo.delete_content(&reference.content_ref).await {
            warn!(
                content_id = %reference.content_ref,
                error = %e,
                "Reference deleted but content could not be marked deleted"
            );
        }

        info!(achievement_id = %reference.id, "Achievement deleted");
        Ok(())
    }

    /// DRAFT or REJECTED -> PENDING. Resubmission clears the rejection note.
    pub async fn submit(&self, identity: &Identity, id: &str) -> Result<AchievementView> {
        let reference = self.repo.get_reference(id).await?;
        Self::require_owner(identity, &reference, "submit")?;
        Self::require_transition(&reference, AchievementStatus::Pending)?;

        let remarks = if reference.status == AchievementStatus::Rejected {
            "Resubmitted for verification"
        } else {
            "Submitted for verification"
        };

        let updated = self
            .repo
            .transition(
                &reference.id,
                StatusChange {
                    expected: reference.status,
                    status: AchievementStatus::Pending,
                    rejection_note: None,
                    verified_by: None,
                },
                &identity.user_id,
                Some(remarks.into()),
            )
            .await?;

        info!(achievement_id = %updated.id, "Achievement submitted");
        self.with_content(updated).await
    }

    /// PENDING -> VERIFIED
    pub async fn verify(&self, identity: &Identity, id: &str, notes: Option<String>) -> Result<AchievementView> {
        let reference = self.repo.get_reference(id).await?;
        self.require_verifier(identity, &reference).await?;
        Self::require_transition(&reference, AchievementStatus::Verified)?;

        let remarks = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Verified".to_string());

        let updated = self
            .repo
            .transition(
                &reference.id,
                StatusChange {
                    expected: reference.status,
                    status: AchievementStatus::Verified,
                    rejection_note: None,
                    verified_by: Some(identity.user_id.clone()),
                },
                &identity.user_id,
                Some(remarks),
            )
            .await?;

        info!(achievement_id = %updated.id, verified_by = %identity.user_id, "Achievement verified");
        self.with_content(updated).await
    }

    /// PENDING -> REJECTED; a note is required
    pub async fn reject(&self, identity: &Identity, id: &str, note: &str) -> Result<AchievementView> {
        let reference = self.repo.get_reference(id).await?;
        self.require_verifier(identity, &reference).await?;
        let note = required("notes", note)?;
        Self::require_transition(&reference, AchievementStatus::Rejected)?;

        let updated = self
            .repo
            .transition(
                &reference.id,
                StatusChange {
                    expected: reference.status,
                    status: AchievementStatus::Rejected,
                    rejection_note: Some(note.clone()),
                    verified_by: None,
                },
                &identity.user_id,
                Some(note),
            )
            .await?;

        info!(achievement_id = %updated.id, rejected_by = %identity.user_id, "Achievement rejected");
        self.with_content(updated).await
    }

    /// Store an evidence file and append it to the achievement's content
    pub async fn upload_attachment(
        &self,
        identity: &Identity,
        id: &str,
        file: UploadedFile,
    ) -> Result<Attachment> {
        let reference = self.load_visible(identity, id).await?;

        let attachment = self.uploads.save(&reference.student_id, &file).await?;
        if let Err(err) = self
            .repo
            .append_attachment(&reference.content_ref, attachment.clone())
            .await
        {
            self.discard_upload(&attachment).await;
            return Err(err);
        }
        self.repo.touch_reference(&reference.id).await?;

        info!(achievement_id = %reference.id, file = %attachment.file_url, "Attachment added");
        Ok(attachment)
    }

    /// Remove a stored file that no record ended up pointing at
    async fn discard_upload(&self, attachment: &Attachment) {
        if let Err(e) = self.uploads.remove(attachment).await {
            warn!(
                file = %attachment.file_url,
                error = %e,
                "Failed to remove orphaned upload"
            );
        }
    }

    async fn with_content(&self, reference: AchievementReference) -> Result<AchievementView> {
        let content = self.repo.get_content(&reference.content_ref).await?;
        Ok(AchievementView::new(reference, content))
    }
}
