//! Diesel models for the relational store
//!
//! Row types (Queryable/Selectable) and insert types (Insertable) for every
//! table in [`super::diesel_schema`].

use diesel::prelude::*;
use serde::Serialize;

use super::diesel_schema::*;
use crate::types::{AchievementHistory, AchievementReference, AchievementStatus, AppError};

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = roles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RoleRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = roles)]
pub struct NewRole<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role_id: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub role_id: &'a str,
    pub is_active: bool,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Partial user update; `None` leaves the column untouched
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub role_id: Option<String>,
    pub is_active: Option<bool>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StudentRow {
    pub id: String,
    pub user_id: String,
    pub student_number: String,
    pub program_study: String,
    pub academic_year: String,
    pub advisor_id: Option<String>,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = students)]
pub struct NewStudent<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub student_number: &'a str,
    pub program_study: &'a str,
    pub academic_year: &'a str,
    pub advisor_id: Option<&'a str>,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = advisors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AdvisorRow {
    pub id: String,
    pub user_id: String,
    pub lecturer_number: String,
    pub department: String,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = advisors)]
pub struct NewAdvisor<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub lecturer_number: &'a str,
    pub department: &'a str,
    pub created_at: &'a str,
}

// ============================================================================
// Achievement workflow
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = achievement_references)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ReferenceRow {
    pub id: String,
    pub student_id: String,
    pub content_ref: String,
    pub status: String,
    pub rejection_note: Option<String>,
    pub verified_by: Option<String>,
    pub verified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<ReferenceRow> for AchievementReference {
    type Error = AppError;

    fn try_from(row: ReferenceRow) -> Result<Self, Self::Error> {
        let status: AchievementStatus = row
            .status
            .parse()
            .map_err(|_| AppError::Database(format!("Corrupt status '{}' on {}", row.status, row.id)))?;

        Ok(AchievementReference {
            id: row.id,
            student_id: row.student_id,
            content_ref: row.content_ref,
            status,
            rejection_note: row.rejection_note,
            verified_by: row.verified_by,
            verified_at: row.verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = achievement_references)]
pub struct NewReference<'a> {
    pub id: &'a str,
    pub student_id: &'a str,
    pub content_ref: &'a str,
    pub status: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = achievement_histories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HistoryRow {
    pub id: i32,
    pub achievement_id: String,
    pub changed_by: String,
    pub previous_status: String,
    pub new_status: String,
    pub remarks: Option<String>,
    pub created_at: String,
}

impl From<HistoryRow> for AchievementHistory {
    fn from(row: HistoryRow) -> Self {
        AchievementHistory {
            id: row.id,
            achievement_id: row.achievement_id,
            changed_by: row.changed_by,
            previous_status: row.previous_status,
            new_status: row.new_status,
            remarks: row.remarks,
            created_at: row.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = achievement_histories)]
pub struct NewHistory<'a> {
    pub achievement_id: &'a str,
    pub changed_by: &'a str,
    pub previous_status: &'a str,
    pub new_status: &'a str,
    pub remarks: Option<&'a str>,
    pub created_at: &'a str,
}
