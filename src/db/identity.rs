//! Identity queries: roles, users, student and advisor profiles

use diesel::prelude::*;

use super::diesel_schema::{advisors, roles, students, users};
use super::models::{
    AdvisorRow, NewAdvisor, NewRole, NewStudent, NewUser, RoleRow, StudentRow, UserChanges, UserRow,
};
use super::{current_timestamp, new_id};
use crate::auth::{Role, RoleRegistry};
use crate::types::{AppError, Result};

// ============================================================================
// Roles
// ============================================================================

pub fn list_roles(conn: &mut SqliteConnection) -> Result<Vec<RoleRow>> {
    Ok(roles::table
        .order(roles::name.asc())
        .select(RoleRow::as_select())
        .load(conn)?)
}

pub fn insert_role(
    conn: &mut SqliteConnection,
    id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<()> {
    let now = current_timestamp();
    diesel::insert_into(roles::table)
        .values(&NewRole {
            id,
            name,
            description,
            created_at: &now,
        })
        .execute(conn)?;
    Ok(())
}

/// Insert any missing default role and return the registry
pub fn load_role_registry(conn: &mut SqliteConnection) -> Result<RoleRegistry> {
    conn.transaction::<_, AppError, _>(|conn| {
        let existing = list_roles(conn)?;
        for role in Role::ALL {
            let present = existing
                .iter()
                .any(|r| Role::from_name(&r.name) == Some(role));
            if !present {
                insert_role(conn, &new_id(), role.name(), Some(role.description()))?;
            }
        }

        let rows = list_roles(conn)?;
        Ok(RoleRegistry::from_rows(
            rows.into_iter().map(|r| (r.id, r.name)),
        ))
    })
}

// ============================================================================
// Users
// ============================================================================

/// Fields of a new account; the password is already hashed
pub struct CreateUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub role_id: &'a str,
}

pub fn insert_user(conn: &mut SqliteConnection, input: &CreateUser<'_>) -> Result<UserRow> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(users::table)
        .values(&NewUser {
            id: &id,
            username: input.username,
            email: input.email,
            password_hash: input.password_hash,
            full_name: input.full_name,
            role_id: input.role_id,
            is_active: true,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    get_user(conn, &id)?.ok_or_else(|| AppError::Internal("Inserted user not readable".into()))
}

pub fn get_user(conn: &mut SqliteConnection, id: &str) -> Result<Option<UserRow>> {
    Ok(users::table
        .filter(users::id.eq(id))
        .select(UserRow::as_select())
        .first(conn)
        .optional()?)
}

pub fn get_user_by_username(conn: &mut SqliteConnection, username: &str) -> Result<Option<UserRow>> {
    Ok(users::table
        .filter(users::username.eq(username))
        .select(UserRow::as_select())
        .first(conn)
        .optional()?)
}

/// All users, newest first
pub fn list_users(conn: &mut SqliteConnection) -> Result<Vec<UserRow>> {
    Ok(users::table
        .order((users::created_at.desc(), users::id.desc()))
        .select(UserRow::as_select())
        .load(conn)?)
}

/// Apply `changes`; `NotFound` when no row has `id`
pub fn update_user(conn: &mut SqliteConnection, id: &str, mut changes: UserChanges) -> Result<UserRow> {
    changes.updated_at = Some(current_timestamp());

    let affected = diesel::update(users::table.filter(users::id.eq(id)))
        .set(&changes)
        .execute(conn)?;
    if affected == 0 {
        return Err(AppError::NotFound(format!("User {} not found", id)));
    }

    get_user(conn, id)?.ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
}

// ============================================================================
// Students
// ============================================================================

pub struct CreateStudent<'a> {
    pub user_id: &'a str,
    pub student_number: &'a str,
    pub program_study: &'a str,
    pub academic_year: &'a str,
    pub advisor_id: Option<&'a str>,
}

pub fn insert_student(conn: &mut SqliteConnection, input: &CreateStudent<'_>) -> Result<StudentRow> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(students::table)
        .values(&NewStudent {
            id: &id,
            user_id: input.user_id,
            student_number: input.student_number,
            program_study: input.program_study,
            academic_year: input.academic_year,
            advisor_id: input.advisor_id,
            created_at: &now,
        })
        .execute(conn)?;

    get_student(conn, &id)?.ok_or_else(|| AppError::Internal("Inserted student not readable".into()))
}

pub fn get_student(conn: &mut SqliteConnection, id: &str) -> Result<Option<StudentRow>> {
    Ok(students::table
        .filter(students::id.eq(id))
        .select(StudentRow::as_select())
        .first(conn)
        .optional()?)
}

pub fn get_student_by_user(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<StudentRow>> {
    Ok(students::table
        .filter(students::user_id.eq(user_id))
        .select(StudentRow::as_select())
        .first(conn)
        .optional()?)
}

/// Students with their account, ordered by student number
pub fn list_students(conn: &mut SqliteConnection) -> Result<Vec<(StudentRow, UserRow)>> {
    Ok(students::table
        .inner_join(users::table)
        .order(students::student_number.asc())
        .select((StudentRow::as_select(), UserRow::as_select()))
        .load(conn)?)
}

/// Students assigned to the advisor whose user id is `advisor_user_id`
pub fn list_advisees(
    conn: &mut SqliteConnection,
    advisor_user_id: &str,
) -> Result<Vec<(StudentRow, UserRow)>> {
    let Some(advisor) = get_advisor_by_user(conn, advisor_user_id)? else {
        return Ok(Vec::new());
    };

    Ok(students::table
        .inner_join(users::table)
        .filter(students::advisor_id.eq(advisor.id))
        .order(students::student_number.asc())
        .select((StudentRow::as_select(), UserRow::as_select()))
        .load(conn)?)
}

pub fn set_student_advisor(
    conn: &mut SqliteConnection,
    student_id: &str,
    advisor_id: Option<&str>,
) -> Result<()> {
    let affected = diesel::update(students::table.filter(students::id.eq(student_id)))
        .set(students::advisor_id.eq(advisor_id))
        .execute(conn)?;
    if affected == 0 {
        return Err(AppError::NotFound(format!("Student {} not found", student_id)));
    }
    Ok(())
}

pub fn count_students(conn: &mut SqliteConnection) -> Result<i64> {
    Ok(students::table.count().get_result(conn)?)
}

// ============================================================================
// Advisors
// ============================================================================

pub struct CreateAdvisor<'a> {
    pub user_id: &'a str,
    pub lecturer_number: &'a str,
    pub department: &'a str,
}

pub fn insert_advisor(conn: &mut SqliteConnection, input: &CreateAdvisor<'_>) -> Result<AdvisorRow> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(advisors::table)
        .values(&NewAdvisor {
            id: &id,
            user_id: input.user_id,
            lecturer_number: input.lecturer_number,
            department: input.department,
            created_at: &now,
        })
        .execute(conn)?;

    get_advisor(conn, &id)?.ok_or_else(|| AppError::Internal("Inserted advisor not readable".into()))
}

pub fn get_advisor(conn: &mut SqliteConnection, id: &str) -> Result<Option<AdvisorRow>> {
    Ok(advisors::table
        .filter(advisors::id.eq(id))
        .select(AdvisorRow::as_select())
        .first(conn)
        .optional()?)
}

pub fn get_advisor_by_user(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<AdvisorRow>> {
    Ok(advisors::table
        .filter(advisors::user_id.eq(user_id))
        .select(AdvisorRow::as_select())
        .first(conn)
        .optional()?)
}

pub fn list_advisors(conn: &mut SqliteConnection) -> Result<Vec<(AdvisorRow, UserRow)>> {
    Ok(advisors::table
        .inner_join(users::table)
        .order(advisors::lecturer_number.asc())
        .select((AdvisorRow::as_select(), UserRow::as_select()))
        .load(conn)?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Seed helpers shared by unit tests in the `db` modules

    use super::*;

    pub struct Seeded {
        pub registry: RoleRegistry,
        pub student_user: String,
        pub student_profile: String,
        pub advisor_user: String,
        pub other_advisor_user: String,
    }

    pub fn user(conn: &mut SqliteConnection, registry: &RoleRegistry, username: &str, role: Role) -> UserRow {
        insert_user(
            conn,
            &CreateUser {
                username,
                email: &format!("{username}@campus.test"),
                password_hash: "$argon2id$placeholder",
                full_name: username,
                role_id: registry.id_for(role).unwrap(),
            },
        )
        .unwrap()
    }

    /// One student assigned to one advisor, plus an unrelated advisor
    pub fn seed(conn: &mut SqliteConnection) -> Seeded {
        let registry = load_role_registry(conn).unwrap();

        let advisor_user = user(conn, &registry, "dr_rahman", Role::Advisor);
        let advisor = insert_advisor(
            conn,
            &CreateAdvisor {
                user_id: &advisor_user.id,
                lecturer_number: "L-001",
                department: "Informatics",
            },
        )
        .unwrap();

        let other_user = user(conn, &registry, "dr_wati", Role::Advisor);
        insert_advisor(
            conn,
            &CreateAdvisor {
                user_id: &other_user.id,
                lecturer_number: "L-002",
                department: "Physics",
            },
        )
        .unwrap();

        let student_user = user(conn, &registry, "sinta", Role::Student);
        let student = insert_student(
            conn,
            &CreateStudent {
                user_id: &student_user.id,
                student_number: "S-1001",
                program_study: "Informatics",
                academic_year: "2023",
                advisor_id: Some(&advisor.id),
            },
        )
        .unwrap();

        Seeded {
            registry,
            student_user: student_user.id,
            student_profile: student.id,
            advisor_user: advisor_user.id,
            other_advisor_user: other_user.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[test]
    fn test_default_roles_seeded_once() {
        let mut conn = test_connection();
        let first = load_role_registry(&mut conn).unwrap();
        let second = load_role_registry(&mut conn).unwrap();

        assert!(first.is_complete());
        assert_eq!(list_roles(&mut conn).unwrap().len(), 3);
        assert_eq!(first.id_for(Role::Admin), second.id_for(Role::Admin));
    }

    #[test]
    fn test_duplicate_username_is_conflict() {
        let mut conn = test_connection();
        let registry = load_role_registry(&mut conn).unwrap();
        fixtures::user(&mut conn, &registry, "budi", Role::Student);

        let err = insert_user(
            &mut conn,
            &CreateUser {
                username: "budi",
                email: "other@campus.test",
                password_hash: "x",
                full_name: "Budi Two",
                role_id: registry.id_for(Role::Student).unwrap(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_advisees_follow_assignment() {
        let mut conn = test_connection();
        let seeded = fixtures::seed(&mut conn);

        let advisees = list_advisees(&mut conn, &seeded.advisor_user).unwrap();
        assert_eq!(advisees.len(), 1);
        assert_eq!(advisees[0].0.user_id, seeded.student_user);

        assert!(list_advisees(&mut conn, &seeded.other_advisor_user)
            .unwrap()
            .is_empty());

        set_student_advisor(&mut conn, &seeded.student_profile, None).unwrap();
        assert!(list_advisees(&mut conn, &seeded.advisor_user).unwrap().is_empty());
    }

    #[test]
    fn test_deactivate_user() {
        let mut conn = test_connection();
        let seeded = fixtures::seed(&mut conn);

        let user = update_user(
            &mut conn,
            &seeded.student_user,
            UserChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!user.is_active);

        let missing = update_user(&mut conn, "nope", UserChanges::default());
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
