use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub uin: String,
    pub phone: Option<String>,
    pub role: String,
    pub institution: Option<String>,
    pub is_active: bool,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub school: Option<String>,
    pub university: Option<String>,
    pub program: Option<String>,
    pub company: Option<String>,
    pub specialization: Option<String>,
    pub approved: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub link: Option<String>,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedItemRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: String,
    pub item_id: String,
    pub saved_at: DateTime<Utc>,
}
