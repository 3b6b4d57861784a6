use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubjectRow {
    pub id: Uuid,
    pub name: String,
    pub subject_code: String,
    pub level: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UniversityRow {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub address: String,
    pub description: String,
    pub website: String,
    pub logo_url: Option<String>,
}

/// Program joined with its university's name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramRow {
    pub id: Uuid,
    pub name: String,
    pub university_id: Uuid,
    pub university_name: String,
    pub degree_type: String,
    pub description: String,
    pub duration_years: i32,
    pub entry_requirements: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CareerPathRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub skills_required: String,
    pub sector: String,
    pub average_salary: String,
    pub job_outlook: String,
    pub trait_profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CareerQuizRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizQuestionRow {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub text: String,
    pub position: i32,
}

/// Option as shown to quiz takers; trait tags stay server-side.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizOptionRow {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizResultRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub answers: Value,
    pub score: Value,
    pub completed_at: DateTime<Utc>,
}

/// Recommendation joined with the career path summary.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecommendationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub career_path_id: Uuid,
    pub career_title: String,
    pub career_sector: String,
    pub score: f64,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}
