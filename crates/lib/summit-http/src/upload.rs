//! Multipart upload extraction and validation.

use std::{error::Error, fmt};

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use summit_core::PdfUpload;
use summit_model::defaults::{UPLOAD_FIELD, has_pdf_extension, looks_like_pdf};

#[derive(Debug)]
pub enum UploadError {
    MissingFile,
    Multipart { status: StatusCode, message: String },
    NotPdfName,
    NotPdfContent,
    TooLarge { limit: usize },
}

impl UploadError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Multipart { status, .. } => *status,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFile => write!(f, "No file was submitted in the '{UPLOAD_FIELD}' field."),
            Self::Multipart { message, .. } => write!(f, "invalid upload: {message}"),
            Self::NotPdfName => write!(f, "Only PDF files are allowed"),
            Self::NotPdfContent => write!(f, "Invalid file type. Only PDF files are allowed."),
            Self::TooLarge { limit } => write!(
                f,
                "File too large. Maximum size is {} MB.",
                limit.div_ceil(1024 * 1024)
            ),
        }
    }
}

impl Error for UploadError {}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        Self::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

/// Reads the `pdf_file` field and validates its name, size and header.
///
/// Other fields are ignored.
pub async fn read_pdf(mut multipart: Multipart, max_bytes: usize) -> Result<PdfUpload, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.trim().is_empty() {
            return Err(UploadError::MissingFile);
        }
        if !has_pdf_extension(&file_name) {
            return Err(UploadError::NotPdfName);
        }
        let bytes = field.bytes().await?;
        return validate(file_name, bytes.to_vec(), max_bytes);
    }
    Err(UploadError::MissingFile)
}

fn validate(file_name: String, bytes: Vec<u8>, max_bytes: usize) -> Result<PdfUpload, UploadError> {
    if bytes.len() > max_bytes {
        return Err(UploadError::TooLarge { limit: max_bytes });
    }
    if !looks_like_pdf(&bytes) {
        return Err(UploadError::NotPdfContent);
    }
    Ok(PdfUpload::new(file_name, bytes))
}
