//! Learning resource vocabulary and the "what to read next" selection.

use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{AppError, FieldErrors};
use crate::models::learning::LearningResourceRow;

pub const PROVIDERS: [&str; 5] = ["COURSERA", "YOUTUBE", "LINKEDIN", "INTERNAL", "OTHER"];
pub const RESOURCE_TYPES: [&str; 5] = ["COURSE", "VIDEO", "ARTICLE", "INTERACTIVE", "BOOK"];
pub const DIFFICULTY_LEVELS: [&str; 3] = ["BEGINNER", "INTERMEDIATE", "ADVANCED"];

/// Maximum resources returned by the recommendation endpoint.
pub const RECOMMENDED_RESOURCE_LIMIT: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct NewResource {
    pub title: String,
    pub description: String,
    pub provider: String,
    pub resource_type: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration: String,
    pub difficulty_level: String,
    #[serde(default)]
    pub skills: String,
    #[serde(default)]
    pub categories: Vec<Uuid>,
}

fn check_url(errors: &mut FieldErrors, url: &str) {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.add("url", "Enter a valid URL");
    }
}

fn check_choice(errors: &mut FieldErrors, field: &str, value: &str, allowed: &[&str]) {
    if !allowed.contains(&value) {
        errors.add(field, format!("'{value}' is not a valid choice"));
    }
}

impl NewResource {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.title.trim().is_empty() {
            errors.add("title", "This field may not be blank");
        }
        check_url(&mut errors, &self.url);
        check_choice(&mut errors, "provider", &self.provider, &PROVIDERS);
        check_choice(&mut errors, "resource_type", &self.resource_type, &RESOURCE_TYPES);
        check_choice(
            &mut errors,
            "difficulty_level",
            &self.difficulty_level,
            &DIFFICULTY_LEVELS,
        );
        errors.into_result()
    }
}

/// Partial edit of a resource. `categories`, when present, replaces the
/// existing links.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub provider: Option<String>,
    pub resource_type: Option<String>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<String>,
    pub difficulty_level: Option<String>,
    pub skills: Option<String>,
    pub categories: Option<Vec<Uuid>>,
}

impl ResourceUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            errors.add("title", "This field may not be blank");
        }
        if let Some(url) = &self.url {
            check_url(&mut errors, url);
        }
        if let Some(provider) = &self.provider {
            check_choice(&mut errors, "provider", provider, &PROVIDERS);
        }
        if let Some(kind) = &self.resource_type {
            check_choice(&mut errors, "resource_type", kind, &RESOURCE_TYPES);
        }
        if let Some(level) = &self.difficulty_level {
            check_choice(&mut errors, "difficulty_level", level, &DIFFICULTY_LEVELS);
        }
        errors.into_result()
    }
}

/// Sorted, duplicate-free copy of a category id list.
pub fn distinct_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();
    ids
}

/// Resources sharing a category come first; the remainder is topped up from
/// `others`, skipping duplicates, up to `limit`.
pub fn merge_recommendations(
    similar: Vec<LearningResourceRow>,
    others: Vec<LearningResourceRow>,
    limit: usize,
) -> Vec<LearningResourceRow> {
    let mut seen = HashSet::new();
    similar
        .into_iter()
        .chain(others)
        .filter(|r| seen.insert(r.id))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn resource(title: &str) -> LearningResourceRow {
        LearningResourceRow {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            provider: "YOUTUBE".into(),
            resource_type: "VIDEO".into(),
            url: "https://example.org".into(),
            thumbnail_url: None,
            duration: "10 minutes".into(),
            difficulty_level: "BEGINNER".into(),
            skills: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_similar_first_then_top_up_without_duplicates() {
        let a = resource("a");
        let b = resource("b");
        let c = resource("c");
        let merged = merge_recommendations(
            vec![a.clone(), b.clone()],
            vec![b.clone(), c.clone()],
            10,
        );
        let titles: Vec<_> = merged.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_respects_limit() {
        let similar: Vec<_> = (0..8).map(|i| resource(&format!("s{i}"))).collect();
        let others: Vec<_> = (0..8).map(|i| resource(&format!("o{i}"))).collect();
        let merged = merge_recommendations(similar, others, RECOMMENDED_RESOURCE_LIMIT);
        assert_eq!(merged.len(), RECOMMENDED_RESOURCE_LIMIT);
        assert_eq!(merged[7].title, "s7");
        assert_eq!(merged[8].title, "o0");
    }

    #[test]
    fn test_new_resource_vocabulary() {
        let mut req = NewResource {
            title: "Rust for beginners".into(),
            description: "Intro".into(),
            provider: "YOUTUBE".into(),
            resource_type: "VIDEO".into(),
            url: "https://youtube.com/watch?v=1".into(),
            thumbnail_url: None,
            duration: "1 hour".into(),
            difficulty_level: "BEGINNER".into(),
            skills: "rust".into(),
            categories: vec![],
        };
        assert!(req.validate().is_ok());

        req.provider = "TIKTOK".into();
        req.url = "ftp://nope".into();
        let AppError::InvalidFields(fields) = req.validate().unwrap_err() else {
            panic!("expected field errors");
        };
        assert!(fields.get("provider").is_some());
        assert!(fields.get("url").is_some());
    }

    #[test]
    fn test_resource_update_checks_only_present_fields() {
        assert!(ResourceUpdate::default().validate().is_ok());

        let update = ResourceUpdate {
            difficulty_level: Some("EXPERT".into()),
            url: Some("https://ok.example".into()),
            ..Default::default()
        };
        let AppError::InvalidFields(fields) = update.validate().unwrap_err() else {
            panic!("expected field errors");
        };
        assert!(fields.get("difficulty_level").is_some());
        assert!(fields.get("url").is_none());
    }

    #[test]
    fn test_distinct_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = distinct_ids(&[b, a, b, a]);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }
}
