//! Attachment files on local disk
//!
//! Files are written under the upload directory as
//! `{owner}_{uuid}{ext}` and served back under `/uploads/`.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use tracing::info;

use crate::content::Attachment;
use crate::types::{AppError, Result};

/// Extensions accepted for evidence files
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "jpg", "jpeg", "png"];

/// URL prefix under which stored files are served
pub const PUBLIC_PREFIX: &str = "/uploads";

/// File received in a multipart body
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Lower-cased extension if it is one we accept
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// MIME type for an accepted extension
fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate and write `file`, returning its attachment entry
    pub async fn save(&self, owner: &str, file: &UploadedFile) -> Result<Attachment> {
        if file.data.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }
        let ext = allowed_extension(&file.file_name).ok_or_else(|| {
            AppError::Validation(format!(
                "File type not allowed; accepted: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let stored_name = format!("{}_{}.{}", owner, uuid::Uuid::new_v4(), ext);
        tokio::fs::write(self.dir.join(&stored_name), &file.data).await?;

        info!(
            file = %stored_name,
            bytes = file.data.len(),
            "Attachment stored"
        );

        Ok(Attachment {
            file_name: file.file_name.clone(),
            file_url: format!("{}/{}", PUBLIC_PREFIX, stored_name),
            file_type: file
                .content_type
                .clone()
                .unwrap_or_else(|| mime_for_extension(&ext).to_string()),
            uploaded_at: Utc::now(),
        })
    }

    /// Delete the file behind `attachment`; a file already gone is not an error
    pub async fn remove(&self, attachment: &Attachment) -> Result<()> {
        let Some(stored_name) = attachment
            .file_url
            .strip_prefix(PUBLIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| is_safe_name(name))
        else {
            return Err(AppError::Validation(format!(
                "Not a stored upload: {}",
                attachment.file_url
            )));
        };

        match tokio::fs::remove_file(self.dir.join(stored_name)).await {
            Ok(()) => {
                info!(file = %stored_name, "Attachment removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a stored file back; `None` for unknown or unsafe names
    pub async fn read(&self, stored_name: &str) -> Result<Option<(Bytes, &'static str)>> {
        if !is_safe_name(stored_name) {
            return Ok(None);
        }
        let Some(ext) = allowed_extension(stored_name) else {
            return Ok(None);
        };

        match tokio::fs::read(self.dir.join(stored_name)).await {
            Ok(data) => Ok(Some((Bytes::from(data), mime_for_extension(&ext)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.into(),
            content_type: None,
            data: Bytes::from_static(b"%PDF-1.4 certificate"),
        }
    }

    #[test]
    fn test_allowed_extensions() {
        assert_eq!(allowed_extension("cert.PDF").as_deref(), Some("pdf"));
        assert_eq!(allowed_extension("photo.jpeg").as_deref(), Some("jpeg"));
        assert!(allowed_extension("script.exe").is_none());
        assert!(allowed_extension("noext").is_none());
    }

    #[tokio::test]
    async fn test_save_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let attachment = store.save("user-1", &file("certificate.pdf")).await.unwrap();
        assert_eq!(attachment.file_name, "certificate.pdf");
        assert_eq!(attachment.file_type, "application/pdf");
        assert!(attachment.file_url.starts_with("/uploads/user-1_"));
        assert!(attachment.file_url.ends_with(".pdf"));

        let stored = attachment.file_url.trim_start_matches("/uploads/");
        let (data, mime) = store.read(stored).await.unwrap().unwrap();
        assert_eq!(&data[..], b"%PDF-1.4 certificate");
        assert_eq!(mime, "application/pdf");
    }

    #[tokio::test]
    async fn test_rejects_disallowed_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        assert!(matches!(
            store.save("user-1", &file("payload.sh")).await,
            Err(AppError::Validation(_))
        ));
        assert!(store.read("../secret.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_deletes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let attachment = store.save("user-1", &file("certificate.pdf")).await.unwrap();
        store.remove(&attachment).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // Second removal finds nothing and still succeeds
        store.remove(&attachment).await.unwrap();

        let mut outside = attachment.clone();
        outside.file_url = "/uploads/../escape.pdf".into();
        assert!(matches!(store.remove(&outside).await, Err(AppError::Validation(_))));
    }
}
