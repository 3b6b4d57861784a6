use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LearningCategoryRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LearningResourceRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub provider: String,
    pub resource_type: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub duration: String,
    pub difficulty_level: String,
    pub skills: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProgressRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub status: String,
    pub completion_percentage: i32,
    pub notes: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LearningTrackRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_by: Uuid,
    pub difficulty_level: String,
    pub skills_gained: String,
    pub estimated_completion_time: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Track list entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackSummaryRow {
    pub id: Uuid,
    pub title: String,
    pub difficulty_level: String,
    pub estimated_completion_time: String,
    pub resource_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackResourceRow {
    pub id: Uuid,
    pub track_id: Uuid,
    pub resource_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackProgressRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub track_id: Uuid,
    pub completion_percentage: i32,
    pub start_date: NaiveDate,
    pub last_activity: DateTime<Utc>,
}
