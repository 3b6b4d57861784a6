//! Caller identity and permission checks.
//!
//! Token verification happens at the gateway in front of this service; it
//! forwards the verified subject and role as `X-User-Id` / `X-User-Role`.

pub mod roles;
pub mod uin;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;
pub use roles::{is_allowed, Operation, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller, extracted from forwarded identity headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

impl CurrentUser {
    /// Fails with `Forbidden` unless the caller's role grants `operation`.
    pub fn require(&self, operation: Operation) -> Result<(), AppError> {
        if is_allowed(self.role, operation) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "Role {} may not perform {operation:?}",
                self.role
            )))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Verified subject id only. Used by registration, where the profile (and
/// therefore the role) does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Subject
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header(parts, USER_ID_HEADER)
            .and_then(|v| Uuid::parse_str(v).ok())
            .map(Subject)
            .ok_or(AppError::Unauthorized)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Subject(id) = Subject::from_request_parts(parts, state).await?;
        let role = header(parts, USER_ROLE_HEADER)
            .and_then(|v| v.parse::<Role>().ok())
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<CurrentUser, AppError> {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_valid_identity() {
        let id = Uuid::new_v4();
        let user = extract(&[
            (USER_ID_HEADER, &id.to_string()),
            (USER_ROLE_HEADER, "TERTIARY"),
        ])
        .await
        .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::TertiaryStudent);
    }

    #[tokio::test]
    async fn test_missing_headers_unauthorized() {
        assert!(matches!(extract(&[]).await, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_bad_role_unauthorized() {
        let id = Uuid::new_v4().to_string();
        let result = extract(&[(USER_ID_HEADER, &id), (USER_ROLE_HEADER, "WIZARD")]).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_subject_needs_only_id() {
        let id = Uuid::new_v4();
        let (mut parts, _) = Request::builder()
            .uri("/")
            .header(USER_ID_HEADER, id.to_string())
            .body(())
            .unwrap()
            .into_parts();
        let subject = Subject::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(subject, Subject(id));
    }

    #[test]
    fn test_require_denies_with_forbidden() {
        let user = CurrentUser {
            id: Uuid::new_v4(),
            role: Role::Employer,
        };
        assert!(user.require(Operation::PostJob).is_ok());
        assert!(matches!(
            user.require(Operation::SubmitAssignment),
            Err(AppError::Forbidden(_))
        ));
    }
}
