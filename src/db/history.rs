//! Append-only log of achievement status transitions

use diesel::prelude::*;

use super::current_timestamp;
use super::diesel_schema::achievement_histories;
use super::models::{HistoryRow, NewHistory};
use crate::types::{AchievementHistory, HistoryEntry, Result};

pub fn append_history(conn: &mut SqliteConnection, entry: &HistoryEntry) -> Result<()> {
    let now = current_timestamp();

    diesel::insert_into(achievement_histories::table)
        .values(&NewHistory {
            achievement_id: &entry.achievement_id,
            changed_by: &entry.changed_by,
            previous_status: entry.previous_label(),
            new_status: entry.new_status.as_str(),
            remarks: entry.remarks.as_deref(),
            created_at: &now,
        })
        .execute(conn)?;

    Ok(())
}

/// Transitions of one achievement, newest first.
///
/// Rows written in the same microsecond fall back to insertion order.
pub fn get_history(conn: &mut SqliteConnection, achievement_id: &str) -> Result<Vec<AchievementHistory>> {
    let rows: Vec<HistoryRow> = achievement_histories::table
        .filter(achievement_histories::achievement_id.eq(achievement_id))
        .order((
            achievement_histories::created_at.desc(),
            achievement_histories::id.desc(),
        ))
        .select(HistoryRow::as_select())
        .load(conn)?;

    Ok(rows.into_iter().map(AchievementHistory::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::identity::fixtures;
    use crate::db::{references, test_connection};
    use crate::types::{AchievementStatus, NO_PREVIOUS_STATUS};

    fn entry(id: &str, prev: Option<AchievementStatus>, next: AchievementStatus) -> HistoryEntry {
        HistoryEntry {
            achievement_id: id.to_string(),
            changed_by: "someone".to_string(),
            previous_status: prev,
            new_status: next,
            remarks: None,
        }
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut conn = test_connection();
        let seeded = fixtures::seed(&mut conn);
        let reference = references::insert_reference(&mut conn, &seeded.student_user, "c1").unwrap();

        append_history(&mut conn, &entry(&reference.id, None, AchievementStatus::Draft)).unwrap();
        append_history(
            &mut conn,
            &entry(&reference.id, Some(AchievementStatus::Draft), AchievementStatus::Pending),
        )
        .unwrap();
        append_history(
            &mut conn,
            &entry(&reference.id, Some(AchievementStatus::Pending), AchievementStatus::Verified),
        )
        .unwrap();

        let history = get_history(&mut conn, &reference.id).unwrap();
        let moves: Vec<(&str, &str)> = history
            .iter()
            .map(|h| (h.previous_status.as_str(), h.new_status.as_str()))
            .collect();
        assert_eq!(
            moves,
            vec![
                ("PENDING", "VERIFIED"),
                ("DRAFT", "PENDING"),
                (NO_PREVIOUS_STATUS, "DRAFT"),
            ]
        );
        for pair in history.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn test_history_removed_with_reference() {
        let mut conn = test_connection();
        let seeded = fixtures::seed(&mut conn);
        let reference = references::insert_reference(&mut conn, &seeded.student_user, "c1").unwrap();
        append_history(&mut conn, &entry(&reference.id, None, AchievementStatus::Draft)).unwrap();

        references::delete_reference(&mut conn, &reference.id).unwrap();
        assert!(get_history(&mut conn, &reference.id).unwrap().is_empty());
    }

    #[test]
    fn test_history_requires_existing_reference() {
        let mut conn = test_connection();
        assert!(append_history(&mut conn, &entry("missing", None, AchievementStatus::Draft)).is_err());
    }
}
