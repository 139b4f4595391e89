//! multipart/form-data uploads.
//!
//! The whole file is read into memory before a form is built, so the body
//! handed to reqwest is complete and never re-reads the file.

use std::path::Path;

use reqwest::multipart::{Form, Part};

use crate::error::{Error, Result};

const FIELD_NAME: &str = "file";
const PART_CONTENT_TYPE: &str = "application/octet-stream";

/// A file read into memory, ready to be sent as the `file` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    file_name: String,
    contents: Vec<u8>,
}

impl MultipartUpload {
    /// Reads `path` in full. The part is named after the file.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read(path).await.map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(FIELD_NAME);
        Ok(Self::new(file_name, contents))
    }

    pub fn new(file_name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            contents,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Builds the single-part form. The boundary is chosen by reqwest.
    pub fn into_form(self) -> std::result::Result<Form, reqwest::Error> {
        let part = Part::bytes(self.contents)
            .file_name(self.file_name)
            .mime_str(PART_CONTENT_TYPE)?;
        Ok(Form::new().part(FIELD_NAME, part))
    }
}
