use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Per-field validation messages, serialized as `{"field": ["msg", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded, otherwise `AppError::InvalidFields`.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidFields(self))
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid fields: {0:?}")]
    InvalidFields(FieldErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        AppError::Forbidden(reason.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::InvalidFields(fields) => {
                details = Some(fields);
                (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "One or more fields are invalid".to_string(),
                )
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = json!(details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        missing_profile_on_fk(err)
    }
}

/// Foreign keys from rows the caller creates for themselves to `users(id)`.
/// Tripping one means the forwarded identity has no registered profile yet.
const CALLER_PROFILE_FOREIGN_KEYS: &[&str] = &[
    "saved_items_user_id_fkey",
    "quiz_results_user_id_fkey",
    "recommendations_user_id_fkey",
    "courses_instructor_id_fkey",
    "course_enrollments_student_id_fkey",
    "submissions_student_id_fkey",
    "jobs_posted_by_fkey",
    "resumes_user_id_fkey",
    "job_applications_applicant_id_fkey",
    "user_progress_user_id_fkey",
    "learning_tracks_created_by_fkey",
    "track_progress_user_id_fkey",
];

/// Maps a caller-profile foreign-key violation to `Forbidden`, everything
/// else to `Database`.
pub fn missing_profile_on_fk(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db)
            if db.is_foreign_key_violation()
                && db
                    .constraint()
                    .is_some_and(|c| CALLER_PROFILE_FOREIGN_KEYS.contains(&c)) =>
        {
            AppError::forbidden("Profile not registered; call POST /api/auth/register first")
        }
        _ => AppError::Database(err),
    }
}

/// Maps a unique-constraint violation to `Conflict`, everything else as `From`.
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::from(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;
    use sqlx::error::{DatabaseError, ErrorKind};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_maps_to_404() {
        let response = AppError::NotFound("Quiz x not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Quiz x not found");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_invalid_fields_carry_details() {
        let mut fields = FieldErrors::new();
        fields.add("answers", "Expected an object");
        fields.add("answers", "Second problem");
        let response = fields.into_result().unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["details"]["answers"][1], "Second problem");
    }

    #[tokio::test]
    async fn test_internal_error_hides_message() {
        let response = AppError::Internal(anyhow::anyhow!("secret")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "An internal server error occurred");
    }

    #[test]
    fn test_empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[derive(Debug)]
    struct Violation {
        foreign_key: bool,
        constraint: &'static str,
    }

    impl std::fmt::Display for Violation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "violates constraint {}", self.constraint)
        }
    }

    impl std::error::Error for Violation {}

    impl DatabaseError for Violation {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn kind(&self) -> ErrorKind {
            if self.foreign_key {
                ErrorKind::ForeignKeyViolation
            } else {
                ErrorKind::UniqueViolation
            }
        }
    }

    fn violation(foreign_key: bool, constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Violation {
            foreign_key,
            constraint,
        }))
    }

    #[tokio::test]
    async fn test_unregistered_caller_is_forbidden_not_500() {
        let err: AppError = violation(true, "quiz_results_user_id_fkey").into();
        assert!(matches!(err, AppError::Forbidden(_)));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[test]
    fn test_other_foreign_keys_stay_database_errors() {
        let err = missing_profile_on_fk(violation(true, "grades_student_id_fkey"));
        assert!(matches!(err, AppError::Database(_)));
        assert!(matches!(
            missing_profile_on_fk(sqlx::Error::RowNotFound),
            AppError::Database(_)
        ));
    }

    #[test]
    fn test_conflict_on_unique_routes_fk_violations() {
        let unique = conflict_on_unique(violation(false, "jobs_pkey"), "duplicate");
        assert!(matches!(unique, AppError::Conflict(_)));

        let fk = conflict_on_unique(violation(true, "job_applications_applicant_id_fkey"), "dup");
        assert!(matches!(fk, AppError::Forbidden(_)));
    }
}
