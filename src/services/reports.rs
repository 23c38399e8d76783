//! Achievement statistics and per-student reports

use std::collections::BTreeMap;

use serde::Serialize;

use super::achievements::{AchievementService, AchievementView};
use super::students::{StudentService, StudentView};
use crate::auth::Identity;
use crate::db::identity as identity_db;
use crate::db::references::ReferenceScope;
use crate::repository::AchievementRepository;
use crate::types::{AchievementStatus, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticsScope {
    Global,
    Personal,
    Advisees,
}

#[derive(Debug, Serialize)]
pub struct Statistics {
    pub scope: StatisticsScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_students: Option<i64>,
    pub total_achievements: usize,
    /// Count per status; every status is present, zero included
    pub by_status: BTreeMap<AchievementStatus, usize>,
}

impl Statistics {
    fn tally(scope: StatisticsScope, statuses: &[AchievementStatus]) -> Self {
        let mut by_status: BTreeMap<AchievementStatus, usize> =
            AchievementStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for status in statuses {
            *by_status.entry(*status).or_default() += 1;
        }
        Self {
            scope,
            total_students: None,
            total_achievements: statuses.len(),
            by_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StudentReport {
    pub student: StudentView,
    pub achievements: Vec<AchievementView>,
    pub statistics: Statistics,
}

pub struct ReportService {
    repo: AchievementRepository,
}

impl ReportService {
    pub fn new(repo: AchievementRepository) -> Self {
        Self { repo }
    }

    /// Global for admins, personal for students, advisees for advisors
    pub async fn statistics(&self, identity: &Identity) -> Result<Statistics> {
        let (scope, refs) = if identity.is_admin() {
            (StatisticsScope::Global, ReferenceScope::All)
        } else if identity.is_student() {
            (
                StatisticsScope::Personal,
                ReferenceScope::Student(identity.user_id.clone()),
            )
        } else {
            (
                StatisticsScope::Advisees,
                ReferenceScope::AdvisorOf(identity.user_id.clone()),
            )
        };

        let statuses = self.repo.statuses(refs).await?;
        let mut stats = Statistics::tally(scope, &statuses);

        if scope == StatisticsScope::Global {
            stats.total_students = Some(
                self.repo
                    .database()
                    .run(identity_db::count_students)
                    .await?,
            );
        }
        Ok(stats)
    }

    /// Student profile plus all of their achievements
    pub async fn student_report(
        &self,
        identity: &Identity,
        student_id: &str,
        students: &StudentService,
        achievements: &AchievementService,
    ) -> Result<StudentReport> {
        let student = students.load_visible(identity, student_id).await?;
        let views = achievements
            .views_for_scope(ReferenceScope::Student(student.user_id.clone()))
            .await?;
        let statuses: Vec<AchievementStatus> = views.iter().map(|v| v.status).collect();

        Ok(StudentReport {
            student,
            achievements: views,
            statistics: Statistics::tally(StatisticsScope::Personal, &statuses),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AchievementStatus::*;

    #[test]
    fn test_tally_counts_every_status() {
        let stats = Statistics::tally(StatisticsScope::Personal, &[Draft, Pending, Pending]);
        assert_eq!(stats.total_achievements, 3);
        assert_eq!(stats.by_status[&Pending], 2);
        assert_eq!(stats.by_status[&Verified], 0);
        assert_eq!(stats.by_status.len(), 4);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["by_status"]["PENDING"], 2);
        assert_eq!(json["scope"], "personal");
        assert!(json.get("total_students").is_none());
    }
}
