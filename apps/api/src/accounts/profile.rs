//! Request validation for registration, profile edits and saved items.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::auth::Role;
use crate::errors::{AppError, FieldErrors};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub school: Option<String>,
    pub university: Option<String>,
    pub program: Option<String>,
    pub company: Option<String>,
    pub specialization: Option<String>,
}

/// A registration that passed validation, with the role resolved.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub approved: bool,
    pub request: RegisterRequest,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<NewProfile, AppError> {
        let mut errors = FieldErrors::new();

        let email = self.email.trim().to_ascii_lowercase();
        if !looks_like_email(&email) {
            errors.add("email", "Enter a valid email address");
        }

        let full_name = self.full_name.trim().to_string();
        if full_name.is_empty() {
            errors.add("full_name", "This field may not be blank");
        }

        let role = match self.role.parse::<Role>() {
            Ok(role) if role.is_self_assignable() => Some(role),
            Ok(role) => {
                errors.add("role", format!("Role {role} cannot be self-assigned"));
                None
            }
            Err(msg) => {
                errors.add("role", msg);
                None
            }
        };

        errors.into_result()?;
        let role = role.ok_or_else(|| AppError::Validation("role is required".into()))?;

        Ok(NewProfile {
            email,
            full_name,
            approved: !role.requires_approval(),
            role,
            request: self,
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

/// PATCH body for the caller's own profile. `role` is accepted only so it
/// can be rejected explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub school: Option<String>,
    pub university: Option<String>,
    pub program: Option<String>,
    pub company: Option<String>,
    pub specialization: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.role.is_some() {
            errors.add("role", "Role cannot be changed");
        }
        if matches!(&self.full_name, Some(name) if name.trim().is_empty()) {
            errors.add("full_name", "This field may not be blank");
        }
        errors.into_result()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Saved items
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedItemKind {
    Course,
    Job,
    Career,
    Resource,
}

impl SavedItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SavedItemKind::Course => "course",
            SavedItemKind::Job => "job",
            SavedItemKind::Career => "career",
            SavedItemKind::Resource => "resource",
        }
    }
}

impl fmt::Display for SavedItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SavedItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "course" => Ok(SavedItemKind::Course),
            "job" => Ok(SavedItemKind::Job),
            "career" => Ok(SavedItemKind::Career),
            "resource" => Ok(SavedItemKind::Resource),
            other => Err(format!("'{other}' is not a valid item type")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveItemRequest {
    pub item_type: String,
    pub item_id: String,
}

impl SaveItemRequest {
    pub fn validate(&self) -> Result<(SavedItemKind, String), AppError> {
        let mut errors = FieldErrors::new();
        let kind = self
            .item_type
            .parse::<SavedItemKind>()
            .map_err(|msg| errors.add("item_type", msg))
            .ok();
        let item_id = self.item_id.trim().to_string();
        if item_id.is_empty() {
            errors.add("item_id", "This field may not be blank");
        }
        errors.into_result()?;
        let kind = kind.ok_or_else(|| AppError::Validation("item_type is required".into()))?;
        Ok((kind, item_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(role: &str) -> RegisterRequest {
        RegisterRequest {
            email: " Ada@Example.org ".into(),
            full_name: "Ada Lovelace".into(),
            role: role.into(),
            phone: None,
            institution: None,
            school: None,
            university: None,
            program: None,
            company: None,
            specialization: None,
        }
    }

    #[test]
    fn test_register_normalises_email() {
        let profile = register("TERTIARY").validate().unwrap();
        assert_eq!(profile.email, "ada@example.org");
        assert_eq!(profile.role, Role::TertiaryStudent);
        assert!(profile.approved);
    }

    #[test]
    fn test_staff_roles_start_unapproved() {
        for code in ["LECTURER", "MENTOR", "EMPLOYER"] {
            assert!(!register(code).validate().unwrap().approved, "{code}");
        }
    }

    #[test]
    fn test_admin_roles_cannot_self_register() {
        for code in ["INST_ADMIN", "MIN_ADMIN", "SUPERUSER"] {
            let AppError::InvalidFields(fields) = register(code).validate().unwrap_err() else {
                panic!("expected field errors for {code}");
            };
            assert!(fields.get("role").is_some());
        }
    }

    #[test]
    fn test_register_collects_every_field_error() {
        let mut req = register("NOPE");
        req.email = "not-an-email".into();
        req.full_name = "   ".into();
        let AppError::InvalidFields(fields) = req.validate().unwrap_err() else {
            panic!("expected field errors");
        };
        for field in ["email", "full_name", "role"] {
            assert!(fields.get(field).is_some(), "{field}");
        }
    }

    #[test]
    fn test_profile_update_rejects_role_change() {
        let update = ProfileUpdate {
            role: Some("SUPERUSER".into()),
            ..Default::default()
        };
        assert!(matches!(update.validate(), Err(AppError::InvalidFields(_))));
        assert!(ProfileUpdate::default().validate().is_ok());
    }

    #[test]
    fn test_saved_item_kind_parsing() {
        let req = SaveItemRequest {
            item_type: "Job".into(),
            item_id: " 42 ".into(),
        };
        assert_eq!(req.validate().unwrap(), (SavedItemKind::Job, "42".to_string()));

        let bad = SaveItemRequest {
            item_type: "video".into(),
            item_id: String::new(),
        };
        let AppError::InvalidFields(fields) = bad.validate().unwrap_err() else {
            panic!("expected field errors");
        };
        assert!(fields.get("item_type").is_some());
        assert!(fields.get("item_id").is_some());
    }
}
