//! Multipart form reading shared by the upload routes

use std::collections::HashMap;

use axum::{body::Bytes, extract::Multipart};

use crate::error::ApiError;

/// A file part of a multipart body
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub bytes: Bytes,
}

/// Every part of a multipart body, split into files and plain text fields.
///
/// A part counts as a file only when its `Content-Disposition` carries a
/// `filename`, so a text field named `image` is not an uploaded image.
#[derive(Debug, Default)]
pub struct UploadForm {
    files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::InvalidMultipart(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::InvalidMultipart(e.body_text()))?;
                    form.files.push(UploadedFile {
                        field: name,
                        file_name,
                        bytes,
                    });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidMultipart(e.body_text()))?;
                    form.fields.entry(name).or_insert(value);
                }
            }
        }

        Ok(form)
    }

    /// First file uploaded under `field`
    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    /// All files uploaded under `field`, in body order
    pub fn files(&self, field: &str) -> Vec<&UploadedFile> {
        self.files.iter().filter(|f| f.field == field).collect()
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}
