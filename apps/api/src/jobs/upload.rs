//! Resume file storage in S3 / MinIO.

use aws_sdk_s3::primitives::ByteStream;
use axum::{extract::multipart::MultipartError, http::StatusCode};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

/// Object key for an uploaded resume file.
pub fn resume_object_key(user_id: Uuid, resume_id: Uuid, file_name: &str) -> String {
    format!("resumes/{user_id}/{resume_id}/{}", sanitize_file_name(file_name))
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; anything else becomes `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "resume".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn check_upload(file_name: &str, size: usize, max_bytes: usize) -> Result<(), AppError> {
    if size == 0 {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    if size > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "Resume files are limited to {max_bytes} bytes"
        )));
    }
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Validation(format!(
            "Resume must be one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    Ok(())
}

/// Body-limit rejections keep their 413; any other multipart failure is a
/// malformed request.
pub fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::Validation(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// The key a new upload makes obsolete, if any.
pub fn replaced_object_key<'a>(previous: Option<&'a str>, current: &str) -> Option<&'a str> {
    previous.filter(|key| *key != current)
}

/// Public URL for an object, path-style (works for MinIO and AWS).
pub fn object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/'))
}

pub struct ResumeFile<'a> {
    pub key: &'a str,
    pub content_type: &'a str,
    pub data: Bytes,
}

pub async fn put_resume_file(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    file: ResumeFile<'_>,
) -> Result<(), AppError> {
    let size = file.data.len();
    s3.put_object()
        .bucket(bucket)
        .key(file.key)
        .body(ByteStream::from(file.data))
        .content_type(file.content_type)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

    info!("Uploaded resume file to s3://{bucket}/{} ({size} bytes)", file.key);
    Ok(())
}

pub async fn delete_resume_file(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
) -> Result<(), AppError> {
    s3.delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("S3 delete failed: {e}")))?;

    info!("Deleted replaced resume file s3://{bucket}/{key}");
    Ok(())
}
