use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub country: String,
    pub description: String,
    pub requirements: String,
    pub responsibilities: String,
    pub benefits: Option<String>,
    pub salary_range: Option<String>,
    pub job_type: String,
    pub skills: String,
    pub application_deadline: NaiveDate,
    pub status: String,
    pub posted_by: Uuid,
    pub company_logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub resume_url: Option<String>,
    pub s3_key: Option<String>,
    pub skills: String,
    pub education: String,
    pub experience: String,
    pub is_active: bool,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application joined with the job's title, company and owner.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobApplicationRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub company: String,
    pub job_owner: Uuid,
    pub applicant_id: Uuid,
    pub resume_id: Option<Uuid>,
    pub cover_letter: String,
    pub status: String,
    pub employer_notes: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
