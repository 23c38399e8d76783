//! multipart/form-data bodies for achievement creation and attachments

use std::collections::HashMap;
use std::convert::Infallible;

use bytes::Bytes;
use futures_util::stream;
use multer::Multipart;

use crate::types::{AppError, Result};
use crate::uploads::UploadedFile;

/// Field carrying the evidence file
pub const FILE_FIELD: &str = "file";

/// Parsed form: text fields by name plus at most one file
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    file: Option<UploadedFile>,
}

impl MultipartForm {
    /// Parse an already collected body; `content_type` carries the boundary
    pub async fn parse(content_type: &str, body: Bytes) -> Result<Self> {
        let boundary = multer::parse_boundary(content_type)?;
        let mut multipart = Multipart::new(
            stream::once(async move { Ok::<Bytes, Infallible>(body) }),
            boundary,
        );

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name().map(str::to_string) {
                if name != FILE_FIELD {
                    continue;
                }
                if form.file.is_some() {
                    return Err(AppError::Validation("Only one file may be uploaded".into()));
                }
                let content_type = field.content_type().map(|m| m.to_string());
                let data = field.bytes().await?;
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let value = field.text().await?;
                form.fields.entry(name).or_default().push(value);
            }
        }

        Ok(form)
    }

    /// First value of a text field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Tags given as repeated fields, comma separated values, or both
    pub fn tags(&self) -> Vec<String> {
        self.fields
            .get("tags")
            .into_iter()
            .flatten()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn take_file(&mut self) -> Option<UploadedFile> {
        self.file.take()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    /// Build a multipart body from text fields and an optional file
    pub fn build(
        boundary: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, mime, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }
}
