use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{CurrentUser, Operation};
use crate::career::catalog::{
    a_level_subjects_for, careers_for_programs, load_quiz_detail, programs_for_subjects,
    require_selection, ProgramSelection, QuizDetail, SubjectSelection, PROGRAM_SELECT,
};
use crate::career::submit::submit_quiz;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::models::career::{
    CareerPathRow, CareerQuizRow, ProgramRow, QuizResultRow, RecommendationRow, SubjectRow,
    UniversityRow,
};
use crate::state::AppState;

const RECOMMENDATION_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.career_path_id, c.title AS career_title,
           c.sector AS career_sector, r.score, r.reasoning, r.created_at
    FROM recommendations r
    JOIN career_paths c ON c.id = r.career_path_id
"#;

const QUIZ_RESULT_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.quiz_id, q.title AS quiz_title,
           r.answers, r.score, r.completed_at
    FROM quiz_results r
    JOIN career_quizzes q ON q.id = r.quiz_id
"#;

// ────────────────────────────────────────────────────────────────────────────
// Catalogue
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubjectFilter {
    pub level: Option<String>,
}

/// GET /api/career/subjects
pub async fn handle_list_subjects(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<SubjectFilter>,
) -> Result<Json<Vec<SubjectRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let rows = sqlx::query_as::<_, SubjectRow>(
        "SELECT * FROM subjects WHERE ($1::text IS NULL OR level = $1) ORDER BY level, name",
    )
    .bind(filter.level)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/career/subjects/:id
pub async fn handle_get_subject(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SubjectRow>, AppError> {
    user.require(Operation::ViewCatalog)?;
    sqlx::query_as::<_, SubjectRow>("SELECT * FROM subjects WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Subject {id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct UniversityFilter {
    pub country: Option<String>,
}

/// GET /api/career/universities
pub async fn handle_list_universities(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<UniversityFilter>,
) -> Result<Json<Vec<UniversityRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let rows = sqlx::query_as::<_, UniversityRow>(
        "SELECT * FROM universities WHERE ($1::text IS NULL OR country = $1) ORDER BY name",
    )
    .bind(filter.country)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/career/universities/:id
pub async fn handle_get_university(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UniversityRow>, AppError> {
    user.require(Operation::ViewCatalog)?;
    sqlx::query_as::<_, UniversityRow>("SELECT * FROM universities WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("University {id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct ProgramFilter {
    pub university: Option<Uuid>,
    pub degree_type: Option<String>,
}

/// GET /api/career/programs
pub async fn handle_list_programs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<ProgramFilter>,
) -> Result<Json<Vec<ProgramRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let sql = format!(
        r#"{PROGRAM_SELECT}
        WHERE ($1::uuid IS NULL OR p.university_id = $1)
          AND ($2::text IS NULL OR p.degree_type = $2)
        ORDER BY p.name"#
    );
    let rows = sqlx::query_as::<_, ProgramRow>(&sql)
        .bind(filter.university)
        .bind(filter.degree_type)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

/// GET /api/career/programs/:id
pub async fn handle_get_program(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ProgramRow>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let sql = format!("{PROGRAM_SELECT} WHERE p.id = $1");
    sqlx::query_as::<_, ProgramRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Program {id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct CareerPathFilter {
    pub sector: Option<String>,
    pub program: Option<Uuid>,
}

/// GET /api/career/career-paths
pub async fn handle_list_career_paths(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<CareerPathFilter>,
) -> Result<Json<Vec<CareerPathRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let rows = sqlx::query_as::<_, CareerPathRow>(
        r#"
        SELECT c.* FROM career_paths c
        WHERE ($1::text IS NULL OR c.sector = $1)
          AND ($2::uuid IS NULL OR EXISTS (
                SELECT 1 FROM career_path_programs cp
                WHERE cp.career_path_id = c.id AND cp.program_id = $2))
        ORDER BY c.title, c.id
        "#,
    )
    .bind(filter.sector)
    .bind(filter.program)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/career/career-paths/:id
pub async fn handle_get_career_path(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<CareerPathRow>, AppError> {
    user.require(Operation::ViewCatalog)?;
    sqlx::query_as::<_, CareerPathRow>("SELECT * FROM career_paths WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Career path {id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Quizzes
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/career/quizzes
pub async fn handle_list_quizzes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<CareerQuizRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let rows =
        sqlx::query_as::<_, CareerQuizRow>("SELECT * FROM career_quizzes ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(rows))
}

/// GET /api/career/quizzes/:id
pub async fn handle_get_quiz(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<QuizDetail>, AppError> {
    user.require(Operation::ViewCatalog)?;
    Ok(Json(load_quiz_detail(&state.db, id).await?))
}

/// POST /api/career/quizzes/:id/submit
pub async fn handle_submit_quiz(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(quiz_id): ApiPath<Uuid>,
    body: Result<ApiJson<Value>, AppError>,
) -> Result<(StatusCode, Json<QuizResultRow>), AppError> {
    user.require(Operation::TakeCareerQuiz)?;
    let result = submit_quiz(
        state.career_store.as_ref(),
        state.match_scorer.as_ref(),
        state.config.recommendation_candidate_limit,
        user.id,
        quiz_id,
        body.map(|ApiJson(value)| value),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/career/quiz-results
pub async fn handle_list_quiz_results(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<QuizResultRow>>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let sql = format!("{QUIZ_RESULT_SELECT} WHERE r.user_id = $1 ORDER BY r.completed_at DESC");
    let rows = sqlx::query_as::<_, QuizResultRow>(&sql)
        .bind(user.id)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

/// GET /api/career/quiz-results/:id
pub async fn handle_get_quiz_result(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<QuizResultRow>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let sql = format!("{QUIZ_RESULT_SELECT} WHERE r.id = $1 AND r.user_id = $2");
    sqlx::query_as::<_, QuizResultRow>(&sql)
        .bind(id)
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Quiz result {id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Recommendations
// ────────────────────────────────────────────────────────────────────────────

async fn own_recommendations(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<RecommendationRow>, AppError> {
    let sql =
        format!("{RECOMMENDATION_SELECT} WHERE r.user_id = $1 ORDER BY r.score DESC, c.title");
    Ok(sqlx::query_as::<_, RecommendationRow>(&sql)
        .bind(user_id)
        .fetch_all(&state.db)
        .await?)
}

/// GET /api/career/recommendations
pub async fn handle_list_recommendations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<RecommendationRow>>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    Ok(Json(own_recommendations(&state, user.id).await?))
}

/// GET /api/career/recommendations/:id
pub async fn handle_get_recommendation(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<RecommendationRow>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let sql = format!("{RECOMMENDATION_SELECT} WHERE r.id = $1 AND r.user_id = $2");
    sqlx::query_as::<_, RecommendationRow>(&sql)
        .bind(id)
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Recommendation {id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Study paths (students only)
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/career/recommend/o-level
pub async fn handle_recommend_from_o_level(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<SubjectSelection>,
) -> Result<Json<Vec<SubjectRow>>, AppError> {
    user.require(Operation::RequestStudyRecommendations)?;
    require_selection(&body.subjects, "O Level subject")?;
    Ok(Json(a_level_subjects_for(&state.db, &body.subjects).await?))
}

/// POST /api/career/recommend/a-level
pub async fn handle_recommend_from_a_level(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<SubjectSelection>,
) -> Result<Json<Vec<ProgramRow>>, AppError> {
    user.require(Operation::RequestStudyRecommendations)?;
    require_selection(&body.subjects, "A Level subject")?;
    Ok(Json(programs_for_subjects(&state.db, &body.subjects).await?))
}

/// POST /api/career/recommend/programs
pub async fn handle_recommend_from_programs(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<ProgramSelection>,
) -> Result<Json<Vec<CareerPathRow>>, AppError> {
    user.require(Operation::RequestStudyRecommendations)?;
    require_selection(&body.programs, "program")?;
    Ok(Json(careers_for_programs(&state.db, &body.programs).await?))
}

#[derive(Debug, Serialize)]
pub struct CareerSuggestions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub recommendations: Vec<RecommendationRow>,
}

/// GET /api/career/recommend/careers
pub async fn handle_recommend_careers(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<CareerSuggestions>, AppError> {
    user.require(Operation::RequestStudyRecommendations)?;

    let taken: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM quiz_results WHERE user_id = $1)")
            .bind(user.id)
            .fetch_one(&state.db)
            .await?;
    if !taken {
        return Ok(Json(CareerSuggestions {
            message: Some(
                "Take a career quiz to get personalized career recommendations".to_string(),
            ),
            recommendations: Vec::new(),
        }));
    }

    Ok(Json(CareerSuggestions {
        message: None,
        recommendations: own_recommendations(&state, user.id).await?,
    }))
}
