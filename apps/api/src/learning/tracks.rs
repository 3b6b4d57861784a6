//! Learning tracks: ordered resource lists with per-user completion.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, FieldErrors};
use crate::learning::catalog::DIFFICULTY_LEVELS;
use crate::models::learning::{
    LearningCategoryRow, LearningResourceRow, LearningTrackRow, TrackProgressRow, TrackResourceRow,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrack {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub difficulty_level: String,
    #[serde(default)]
    pub skills_gained: String,
    #[serde(default)]
    pub estimated_completion_time: String,
    #[serde(default)]
    pub categories: Vec<Uuid>,
}

impl NewTrack {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_track_fields(&mut errors, Some(&self.title), Some(&self.difficulty_level));
        errors.into_result()
    }
}

/// Partial edit of a track. `categories`, when present, replaces the links.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty_level: Option<String>,
    pub skills_gained: Option<String>,
    pub estimated_completion_time: Option<String>,
    pub categories: Option<Vec<Uuid>>,
}

impl TrackUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_track_fields(
            &mut errors,
            self.title.as_deref(),
            self.difficulty_level.as_deref(),
        );
        errors.into_result()
    }
}

fn check_track_fields(errors: &mut FieldErrors, title: Option<&str>, level: Option<&str>) {
    if title.is_some_and(|t| t.trim().is_empty()) {
        errors.add("title", "This field may not be blank");
    }
    if let Some(level) = level.filter(|l| !DIFFICULTY_LEVELS.contains(l)) {
        errors.add("difficulty_level", format!("'{level}' is not a valid choice"));
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrackResource {
    pub resource_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackResourceUpdate {
    pub resource_id: Option<Uuid>,
    pub position: Option<i32>,
}

pub fn check_position(position: Option<i32>) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    if position.is_some_and(|p| p < 0) {
        errors.add("position", "Must not be negative");
    }
    errors.into_result()
}

/// Whole-number completion of a track: completed resources over all of the
/// track's resources, rounded down. An empty track is 0%.
pub fn track_completion(completed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    (completed.clamp(0, total) * 100 / total) as i32
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackResourceEntry {
    pub id: Uuid,
    pub position: i32,
    pub resource: LearningResourceRow,
}

/// Pairs each track link with its resource, ordered by position. Links whose
/// resource is missing are dropped.
pub fn assemble_track_resources(
    links: Vec<TrackResourceRow>,
    resources: Vec<LearningResourceRow>,
) -> Vec<TrackResourceEntry> {
    let mut by_id: HashMap<Uuid, LearningResourceRow> =
        resources.into_iter().map(|r| (r.id, r)).collect();
    let mut entries: Vec<TrackResourceEntry> = links
        .into_iter()
        .filter_map(|link| {
            let resource = by_id.remove(&link.resource_id)?;
            Some(TrackResourceEntry {
                id: link.id,
                position: link.position,
                resource,
            })
        })
        .collect();
    entries.sort_by_key(|e| (e.position, e.id));
    entries
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackProgressSummary {
    pub completion_percentage: i32,
    pub start_date: NaiveDate,
    pub last_activity: DateTime<Utc>,
}

impl From<TrackProgressRow> for TrackProgressSummary {
    fn from(row: TrackProgressRow) -> Self {
        Self {
            completion_percentage: row.completion_percentage,
            start_date: row.start_date,
            last_activity: row.last_activity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackDetail {
    #[serde(flatten)]
    pub track: LearningTrackRow,
    pub categories: Vec<LearningCategoryRow>,
    pub track_resources: Vec<TrackResourceEntry>,
    pub user_progress: Option<TrackProgressSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resource(title: &str) -> LearningResourceRow {
        LearningResourceRow {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            provider: "INTERNAL".into(),
            resource_type: "ARTICLE".into(),
            url: "https://example.org".into(),
            thumbnail_url: None,
            duration: String::new(),
            difficulty_level: "BEGINNER".into(),
            skills: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn link(resource: &LearningResourceRow, position: i32) -> TrackResourceRow {
        TrackResourceRow {
            id: Uuid::new_v4(),
            track_id: Uuid::nil(),
            resource_id: resource.id,
            position,
        }
    }

    #[test]
    fn test_track_completion_rounds_down() {
        assert_eq!(track_completion(0, 0), 0);
        assert_eq!(track_completion(0, 3), 0);
        assert_eq!(track_completion(1, 3), 33);
        assert_eq!(track_completion(2, 3), 66);
        assert_eq!(track_completion(3, 3), 100);
        assert_eq!(track_completion(5, 3), 100);
    }

    #[test]
    fn test_track_resources_follow_position() {
        let intro = resource("intro");
        let deep = resource("deep dive");
        let gone = resource("deleted");
        let links = vec![link(&deep, 2), link(&intro, 1), link(&gone, 0)];

        let entries = assemble_track_resources(links, vec![deep.clone(), intro.clone()]);

        let titles: Vec<_> = entries.iter().map(|e| e.resource.title.as_str()).collect();
        assert_eq!(titles, vec!["intro", "deep dive"]);
        assert_eq!(entries[0].position, 1);
    }

    #[test]
    fn test_track_validation() {
        let track = NewTrack {
            title: "Backend path".into(),
            description: String::new(),
            difficulty_level: "INTERMEDIATE".into(),
            skills_gained: "sql, http".into(),
            estimated_completion_time: "6 weeks".into(),
            categories: vec![],
        };
        assert!(track.validate().is_ok());

        let bad = NewTrack {
            title: " ".into(),
            difficulty_level: "GURU".into(),
            ..track
        };
        let AppError::InvalidFields(fields) = bad.validate().unwrap_err() else {
            panic!("expected field errors");
        };
        assert!(fields.get("title").is_some());
        assert!(fields.get("difficulty_level").is_some());

        assert!(TrackUpdate::default().validate().is_ok());
        assert!(check_position(Some(-1)).is_err());
        assert!(check_position(None).is_ok());
    }
}
