//! Shared setup for integration tests: an on-disk SQLite database in a temp
//! directory, the in-memory content store, and a small seeded campus.

#![allow(dead_code)]

use accolade::auth::{Identity, Role};
use accolade::config::Args;
use accolade::content::{
    AchievementContent, Attachment, ContentPatch, ContentStore, MemoryContentStore, NewContent,
};
use accolade::db::Database;
use accolade::server::AppState;
use accolade::services::{AdvisorProfileInput, CreateUserInput, StudentProfileInput};
use accolade::types::{AppError, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const PASSWORD: &str = "correct-horse";

/// In-memory content store whose writes can be made to fail
#[derive(Clone, Default)]
pub struct SwitchableContentStore {
    inner: MemoryContentStore,
    down: Arc<AtomicBool>,
}

impl SwitchableContentStore {
    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::Database("content store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ContentStore for SwitchableContentStore {
    async fn insert(&self, content: NewContent) -> Result<String> {
        self.check()?;
        self.inner.insert(content).await
    }

    async fn get(&self, id: &str) -> Result<Option<AchievementContent>> {
        self.inner.get(id).await
    }

    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, AchievementContent>> {
        self.inner.get_many(ids).await
    }

    async fn update_fields(&self, id: &str, patch: &ContentPatch) -> Result<()> {
        self.check()?;
        self.inner.update_fields(id, patch).await
    }

    async fn append_attachment(&self, id: &str, attachment: Attachment) -> Result<()> {
        self.check()?;
        self.inner.append_attachment(id, attachment).await
    }

    async fn mark_deleted(&self, id: &str) -> Result<()> {
        self.inner.mark_deleted(id).await
    }
}

pub struct Campus {
    pub state: Arc<AppState>,
    pub content: MemoryContentStore,
    pub admin: Identity,
    /// Student assigned to `advisor`
    pub student: Identity,
    pub student_profile: String,
    /// Student with no advisor
    pub other_student: Identity,
    pub advisor: Identity,
    pub advisor_profile: String,
    pub other_advisor: Identity,
    content_down: Arc<AtomicBool>,
    _temp: TempDir,
}

impl Campus {
    /// Make content-store writes fail (or succeed again)
    pub fn set_content_down(&self, down: bool) {
        self.content_down.store(down, Ordering::SeqCst);
    }

    /// Number of files in the upload directory
    pub fn stored_upload_count(&self) -> usize {
        count_files(self.state.uploads.dir())
    }
}

fn count_files(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

fn args_for(temp: &TempDir) -> Args {
    let db = temp.path().join("accolade.db");
    let uploads = temp.path().join("uploads");
    Args::parse_from([
        "accolade",
        "--dev-mode",
        "--database-url",
        db.to_str().unwrap(),
        "--upload-dir",
        uploads.to_str().unwrap(),
        "--db-pool-min-idle",
        "1",
        "--db-pool-max-size",
        "8",
        "--max-upload-bytes",
        "65536",
    ])
}

async fn create_user(
    state: &AppState,
    admin: &Identity,
    username: &str,
    role: Role,
    student_profile: Option<StudentProfileInput>,
    advisor_profile: Option<AdvisorProfileInput>,
) -> Identity {
    let view = state
        .users
        .create(
            admin,
            CreateUserInput {
                username: username.to_string(),
                email: format!("{username}@campus.test"),
                password: PASSWORD.to_string(),
                full_name: username.to_string(),
                role_id: state.roles.id_for(role).unwrap().to_string(),
                student_profile,
                advisor_profile,
            },
        )
        .await
        .unwrap();
    Identity::new(view.id, role)
}

/// Fresh database with one admin, two advisors and two students
pub async fn create_campus() -> Campus {
    let temp = TempDir::new().unwrap();
    let args = args_for(&temp);

    let db = Database::connect(&args.database_url, &args.pool_settings()).unwrap();
    let store = SwitchableContentStore::default();
    let content = store.inner.clone();
    let content_down = store.down.clone();
    let state = AppState::new(args, db, Arc::new(store), "memory")
        .await
        .unwrap();

    // Services only look at the caller's role, so a synthetic admin can seed
    let seeder = Identity::new("seeder", Role::Admin);
    let admin = create_user(&state, &seeder, "admin", Role::Admin, None, None).await;

    let advisor = create_user(
        &state,
        &admin,
        "dr_rahman",
        Role::Advisor,
        None,
        Some(AdvisorProfileInput {
            lecturer_number: "L-001".into(),
            department: "Informatics".into(),
        }),
    )
    .await;
    let other_advisor = create_user(
        &state,
        &admin,
        "dr_wati",
        Role::Advisor,
        None,
        Some(AdvisorProfileInput {
            lecturer_number: "L-002".into(),
            department: "Physics".into(),
        }),
    )
    .await;

    let advisor_profile = state
        .students
        .list_advisors(&advisor)
        .await
        .unwrap()
        .pop()
        .unwrap()
        .id;

    let student = create_user(
        &state,
        &admin,
        "sinta",
        Role::Student,
        Some(StudentProfileInput {
            student_number: "S-1001".into(),
            program_study: "Informatics".into(),
            academic_year: "2023".into(),
            advisor_id: Some(advisor_profile.clone()),
        }),
        None,
    )
    .await;
    let other_student = create_user(
        &state,
        &admin,
        "budi",
        Role::Student,
        Some(StudentProfileInput {
            student_number: "S-1002".into(),
            program_study: "Physics".into(),
            academic_year: "2023".into(),
            advisor_id: None,
        }),
        None,
    )
    .await;

    let student_profile = state
        .students
        .list(&student)
        .await
        .unwrap()
        .pop()
        .unwrap()
        .id;

    Campus {
        state: Arc::new(state),
        content,
        admin,
        student,
        student_profile,
        other_student,
        advisor,
        advisor_profile,
        other_advisor,
        content_down,
        _temp: temp,
    }
}
