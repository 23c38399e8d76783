//! Achievement reference store
//!
//! One row per achievement holding its workflow status and verification
//! metadata. All list queries return newest first.

use diesel::prelude::*;

use super::diesel_schema::{achievement_references, advisors, students};
use super::models::{NewReference, ReferenceRow};
use super::{current_timestamp, new_id};
use crate::types::{AchievementReference, AchievementStatus, AppError, Result, StatusChange};

/// Which references a query or report covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceScope {
    All,
    /// Achievements owned by one student (user id)
    Student(String),
    /// Achievements of the students assigned to an advisor (advisor user id)
    AdvisorOf(String),
}

fn to_domain(rows: Vec<ReferenceRow>) -> Result<Vec<AchievementReference>> {
    rows.into_iter().map(AchievementReference::try_from).collect()
}

/// Insert a new reference; status always starts as DRAFT
pub fn insert_reference(
    conn: &mut SqliteConnection,
    student_id: &str,
    content_ref: &str,
) -> Result<AchievementReference> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(achievement_references::table)
        .values(&NewReference {
            id: &id,
            student_id,
            content_ref,
            status: AchievementStatus::Draft.as_str(),
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    get_reference(conn, &id)?
        .ok_or_else(|| AppError::Internal("Inserted reference not readable".into()))
}

pub fn get_reference(conn: &mut SqliteConnection, id: &str) -> Result<Option<AchievementReference>> {
    achievement_references::table
        .filter(achievement_references::id.eq(id))
        .select(ReferenceRow::as_select())
        .first(conn)
        .optional()?
        .map(AchievementReference::try_from)
        .transpose()
}

/// References visible under `scope`, newest first
pub fn list_references(
    conn: &mut SqliteConnection,
    scope: &ReferenceScope,
) -> Result<Vec<AchievementReference>> {
    let mut query = achievement_references::table
        .select(ReferenceRow::as_select())
        .into_boxed();

    match scope {
        ReferenceScope::All => {}
        ReferenceScope::Student(student_id) => {
            query = query.filter(achievement_references::student_id.eq(student_id.clone()));
        }
        ReferenceScope::AdvisorOf(advisor_user_id) => {
            let advisees = advisee_user_ids(conn, advisor_user_id)?;
            query = query.filter(achievement_references::student_id.eq_any(advisees));
        }
    }

    let rows = query
        .order((
            achievement_references::created_at.desc(),
            achievement_references::id.desc(),
        ))
        .load(conn)?;

    to_domain(rows)
}

/// User ids of the students assigned to the advisor with user id `advisor_user_id`
pub fn advisee_user_ids(conn: &mut SqliteConnection, advisor_user_id: &str) -> Result<Vec<String>> {
    Ok(students::table
        .inner_join(advisors::table)
        .filter(advisors::user_id.eq(advisor_user_id))
        .select(students::user_id)
        .load(conn)?)
}

fn require_one(affected: usize, id: &str) -> Result<()> {
    if affected == 0 {
        return Err(AppError::NotFound(format!("Achievement {} not found", id)));
    }
    Ok(())
}

/// Unconditional single-row status update
pub fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: AchievementStatus,
    rejection_note: Option<&str>,
) -> Result<()> {
    let affected = diesel::update(achievement_references::table.filter(achievement_references::id.eq(id)))
        .set((
            achievement_references::status.eq(status.as_str()),
            achievement_references::rejection_note.eq(rejection_note),
            achievement_references::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;
    require_one(affected, id)
}

/// Record who verified the achievement and when
pub fn set_verified(conn: &mut SqliteConnection, id: &str, verifier_id: &str) -> Result<()> {
    let now = current_timestamp();
    let affected = diesel::update(achievement_references::table.filter(achievement_references::id.eq(id)))
        .set((
            achievement_references::verified_by.eq(verifier_id),
            achievement_references::verified_at.eq(&now),
            achievement_references::updated_at.eq(&now),
        ))
        .execute(conn)?;
    require_one(affected, id)
}

/// Apply a workflow change only while the row still has `change.expected`.
///
/// Returns `BusinessRule` when the row moved on since it was read.
pub fn apply_status_change(conn: &mut SqliteConnection, id: &str, change: &StatusChange) -> Result<()> {
    let now = current_timestamp();
    let target = achievement_references::table
        .filter(achievement_references::id.eq(id))
        .filter(achievement_references::status.eq(change.expected.as_str()));

    let affected = match &change.verified_by {
        Some(verifier) => diesel::update(target)
            .set((
                achievement_references::status.eq(change.status.as_str()),
                achievement_references::rejection_note.eq(change.rejection_note.as_deref()),
                achievement_references::verified_by.eq(verifier),
                achievement_references::verified_at.eq(&now),
                achievement_references::updated_at.eq(&now),
            ))
            .execute(conn)?,
        None => diesel::update(target)
            .set((
                achievement_references::status.eq(change.status.as_str()),
                achievement_references::rejection_note.eq(change.rejection_note.as_deref()),
                achievement_references::updated_at.eq(&now),
            ))
            .execute(conn)?,
    };

    if affected == 0 {
        return match get_reference(conn, id)? {
            None => Err(AppError::NotFound(format!("Achievement {} not found", id))),
            Some(current) => Err(AppError::BusinessRule(format!(
                "Achievement is {} (expected {})",
                current.status, change.expected
            ))),
        };
    }
    Ok(())
}

/// Refresh `updated_at` after a content-only change
pub fn touch(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    let affected = diesel::update(achievement_references::table.filter(achievement_references::id.eq(id)))
        .set(achievement_references::updated_at.eq(current_timestamp()))
        .execute(conn)?;
    require_one(affected, id)
}

/// Hard delete of the reference row; the content document is untouched
pub fn delete_reference(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    let affected =
        diesel::delete(achievement_references::table.filter(achievement_references::id.eq(id)))
            .execute(conn)?;
    require_one(affected, id)
}

/// Delete the reference only while it is still DRAFT
pub fn delete_draft_reference(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    let affected = diesel::delete(
        achievement_references::table
            .filter(achievement_references::id.eq(id))
            .filter(achievement_references::status.eq(AchievementStatus::Draft.as_str())),
    )
    .execute(conn)?;

    if affected == 0 {
        return Err(locked_or_missing(conn, id, "deleted")?);
    }
    Ok(())
}

/// Refresh `updated_at` only while the reference is DRAFT or REJECTED
pub fn touch_editable(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    let editable = [
        AchievementStatus::Draft.as_str(),
        AchievementStatus::Rejected.as_str(),
    ];
    let affected = diesel::update(
        achievement_references::table
            .filter(achievement_references::id.eq(id))
            .filter(achievement_references::status.eq_any(editable)),
    )
    .set(achievement_references::updated_at.eq(current_timestamp()))
    .execute(conn)?;

    if affected == 0 {
        return Err(locked_or_missing(conn, id, "edited")?);
    }
    Ok(())
}

/// Error for a guarded write that matched no row
fn locked_or_missing(conn: &mut SqliteConnection, id: &str, action: &str) -> Result<AppError> {
    Ok(match get_reference(conn, id)? {
        None => AppError::NotFound(format!("Achievement {} not found", id)),
        Some(current) => AppError::BusinessRule(format!(
            "Achievement is {} and can no longer be {}",
            current.status, action
        )),
    })
}

/// Whether `advisor_user_id` is the registered advisor of the reference's owner
pub fn is_advisor_of(conn: &mut SqliteConnection, reference_id: &str, advisor_user_id: &str) -> Result<bool> {
    let owner: Option<String> = achievement_references::table
        .filter(achievement_references::id.eq(reference_id))
        .select(achievement_references::student_id)
        .first(conn)
        .optional()?;
    let Some(owner) = owner else {
        return Ok(false);
    };

    let matched: i64 = students::table
        .inner_join(advisors::table)
        .filter(students::user_id.eq(owner))
        .filter(advisors::user_id.eq(advisor_user_id))
        .count()
        .get_result(conn)?;

    Ok(matched > 0)
}

/// Statuses of every reference under `scope`
pub fn statuses(conn: &mut SqliteConnection, scope: &ReferenceScope) -> Result<Vec<AchievementStatus>> {
    Ok(list_references(conn, scope)?
        .into_iter()
        .map(|r| r.status)
        .collect())
}
