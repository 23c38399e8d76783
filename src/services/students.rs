//! Student and advisor profiles
//!
//! Path ids are profile ids (`students.id`, `advisors.id`), not user ids.

use serde::Serialize;
use tracing::info;

use super::achievements::{AchievementService, AchievementView};
use super::require_admin;
use crate::auth::Identity;
use crate::db::identity as identity_db;
use crate::db::models::{AdvisorRow, StudentRow, UserRow};
use crate::db::references::ReferenceScope;
use crate::db::Database;
use crate::types::{AppError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct StudentView {
    pub id: String,
    pub user_id: String,
    pub student_number: String,
    pub program_study: String,
    pub academic_year: String,
    pub advisor_id: Option<String>,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub created_at: String,
}

impl StudentView {
    fn new(student: StudentRow, user: UserRow) -> Self {
        Self {
            id: student.id,
            user_id: student.user_id,
            student_number: student.student_number,
            program_study: student.program_study,
            academic_year: student.academic_year,
            advisor_id: student.advisor_id,
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            created_at: student.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvisorView {
    pub id: String,
    pub user_id: String,
    pub lecturer_number: String,
    pub department: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
}

impl AdvisorView {
    fn new(advisor: AdvisorRow, user: UserRow) -> Self {
        Self {
            id: advisor.id,
            user_id: advisor.user_id,
            lecturer_number: advisor.lecturer_number,
            department: advisor.department,
            username: user.username,
            full_name: user.full_name,
            email: user.email,
        }
    }
}

pub struct StudentService {
    db: Database,
}

impl StudentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn to_views(rows: Vec<(StudentRow, UserRow)>) -> Vec<StudentView> {
        rows.into_iter().map(|(s, u)| StudentView::new(s, u)).collect()
    }

    /// Admin, the student, or the student's assigned advisor
    async fn can_view_student(&self, identity: &Identity, student: &StudentRow) -> Result<bool> {
        if identity.is_admin() {
            return Ok(true);
        }
        if identity.is_student() {
            return Ok(student.user_id == identity.user_id);
        }
        let Some(advisor_id) = student.advisor_id.clone() else {
            return Ok(false);
        };
        let user_id = identity.user_id.clone();
        let advisor = self
            .db
            .run(move |conn| identity_db::get_advisor_by_user(conn, &user_id))
            .await?;
        Ok(advisor.is_some_and(|a| a.id == advisor_id))
    }

    /// Student profile `id` with its account, if the caller may see it
    pub async fn load_visible(&self, identity: &Identity, id: &str) -> Result<StudentView> {
        let id = id.to_string();
        let (student, user) = self
            .db
            .run(move |conn| {
                let student = identity_db::get_student(conn, &id)?
                    .ok_or_else(|| AppError::NotFound(format!("Student {} not found", id)))?;
                let user = identity_db::get_user(conn, &student.user_id)?.ok_or_else(|| {
                    AppError::Internal(format!("Student {} has no account", student.id))
                })?;
                Ok((student, user))
            })
            .await?;

        if !self.can_view_student(identity, &student).await? {
            return Err(AppError::Forbidden("You do not have access to this student".into()));
        }
        Ok(StudentView::new(student, user))
    }

    /// Admin sees all students, an advisor their advisees, a student themself
    pub async fn list(&self, identity: &Identity) -> Result<Vec<StudentView>> {
        let user_id = identity.user_id.clone();
        let rows = if identity.is_admin() {
            self.db.run(identity_db::list_students).await?
        } else if identity.is_advisor() {
            self.db
                .run(move |conn| identity_db::list_advisees(conn, &user_id))
                .await?
        } else {
            self.db
                .run(move |conn| {
                    let Some(student) = identity_db::get_student_by_user(conn, &user_id)? else {
                        return Ok(Vec::new());
                    };
                    let user = identity_db::get_user(conn, &user_id)?;
                    Ok(user.map(|u| vec![(student, u)]).unwrap_or_default())
                })
                .await?
        };
        Ok(Self::to_views(rows))
    }

    pub async fn get(&self, identity: &Identity, id: &str) -> Result<StudentView> {
        self.load_visible(identity, id).await
    }

    /// Achievements of one student, with content
    pub async fn achievements(
        &self,
        identity: &Identity,
        id: &str,
        achievements: &AchievementService,
    ) -> Result<Vec<AchievementView>> {
        let student = self.load_visible(identity, id).await?;
        achievements
            .views_for_scope(ReferenceScope::Student(student.user_id))
            .await
    }

    /// Assign or clear a student's advisor (admin only)
    pub async fn set_advisor(
        &self,
        identity: &Identity,
        id: &str,
        advisor_id: Option<String>,
    ) -> Result<StudentView> {
        require_admin(identity)?;

        let student_id = id.to_string();
        let assigned = advisor_id.clone();
        self.db
            .transaction(move |conn| {
                if let Some(advisor_id) = assigned.as_deref() {
                    if identity_db::get_advisor(conn, advisor_id)?.is_none() {
                        return Err(AppError::NotFound(format!("Advisor {} not found", advisor_id)));
                    }
                }
                identity_db::set_student_advisor(conn, &student_id, assigned.as_deref())
            })
            .await?;

        info!(student_id = %id, advisor_id = ?advisor_id, "Advisor assigned");
        self.load_visible(identity, id).await
    }

    /// Admin sees every advisor, an advisor only themself
    pub async fn list_advisors(&self, identity: &Identity) -> Result<Vec<AdvisorView>> {
        if !identity.is_admin() && !identity.is_advisor() {
            return Err(AppError::Forbidden("Advisor list is not available to students".into()));
        }
        let rows = self.db.run(identity_db::list_advisors).await?;
        Ok(rows
            .into_iter()
            .filter(|(a, _)| identity.is_admin() || a.user_id == identity.user_id)
            .map(|(a, u)| AdvisorView::new(a, u))
            .collect())
    }

    /// Students assigned to advisor profile `id` (admin or that advisor)
    pub async fn advisees(&self, identity: &Identity, id: &str) -> Result<Vec<StudentView>> {
        let advisor_id = id.to_string();
        let advisor = self
            .db
            .run(move |conn| {
                identity_db::get_advisor(conn, &advisor_id)?
                    .ok_or_else(|| AppError::NotFound(format!("Advisor {} not found", advisor_id)))
            })
            .await?;

        if !identity.is_admin() && advisor.user_id != identity.user_id {
            return Err(AppError::Forbidden("You can only list your own advisees".into()));
        }

        let rows = self
            .db
            .run(move |conn| identity_db::list_advisees(conn, &advisor.user_id))
            .await?;
        Ok(Self::to_views(rows))
    }
}
