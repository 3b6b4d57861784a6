use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{is_allowed, CurrentUser, Operation, Role};
use crate::errors::{conflict_on_unique, AppError};
use crate::extract::{ApiJson, ApiPath};
use crate::jobs::postings::{transition, JobPosting};
use crate::jobs::upload::{
    check_upload, delete_resume_file, multipart_error, object_url, put_resume_file,
    replaced_object_key, resume_object_key, ResumeFile,
};
use crate::models::jobs::{JobApplicationRow, JobRow, ResumeRow};
use crate::state::AppState;

const APPLICATION_SELECT: &str = r#"
    SELECT a.id, a.job_id, j.title AS job_title, j.company, j.posted_by AS job_owner,
           a.applicant_id, a.resume_id, a.cover_letter, a.status, a.employer_notes,
           a.applied_at, a.updated_at
    FROM job_applications a
    JOIN jobs j ON j.id = a.job_id
"#;

async fn load_job(state: &AppState, job_id: Uuid) -> Result<JobRow, AppError> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))
}

fn require_owner(job: &JobRow, user: &CurrentUser) -> Result<(), AppError> {
    if job.posted_by == user.id || user.role == Role::Superuser {
        Ok(())
    } else {
        Err(AppError::forbidden("Only the employer who posted this job may do this"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Jobs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JobFilter {
    pub job_type: Option<String>,
    pub country: Option<String>,
    pub q: Option<String>,
}

/// GET /api/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<JobFilter>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let q = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT * FROM jobs
        WHERE status = 'OPEN'
          AND ($1::text IS NULL OR job_type = $1)
          AND ($2::text IS NULL OR country ILIKE $2)
          AND ($3::text IS NULL
               OR title ILIKE '%' || $3 || '%'
               OR company ILIKE '%' || $3 || '%'
               OR description ILIKE '%' || $3 || '%'
               OR skills ILIKE '%' || $3 || '%')
        ORDER BY created_at DESC
        "#,
    )
    .bind(filter.job_type)
    .bind(filter.country)
    .bind(q)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/jobs/mine
pub async fn handle_list_my_jobs(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<JobRow>>, AppError> {
    user.require(Operation::PostJob)?;
    let rows = sqlx::query_as::<_, JobRow>(
        "SELECT * FROM jobs WHERE posted_by = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    user.require(Operation::ViewCatalog)?;
    Ok(Json(load_job(&state, id).await?))
}

/// POST /api/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(job): ApiJson<JobPosting>,
) -> Result<(StatusCode, Json<JobRow>), AppError> {
    user.require(Operation::PostJob)?;
    let status = job.validate()?;

    let row = sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs (id, title, company, location, country, description, requirements,
                          responsibilities, benefits, salary_range, job_type, skills,
                          application_deadline, status, posted_by, company_logo_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(job.title.trim())
    .bind(job.company.trim())
    .bind(job.location.trim())
    .bind(job.country.trim())
    .bind(&job.description)
    .bind(&job.requirements)
    .bind(&job.responsibilities)
    .bind(&job.benefits)
    .bind(&job.salary_range)
    .bind(&job.job_type)
    .bind(&job.skills)
    .bind(job.application_deadline)
    .bind(status)
    .bind(user.id)
    .bind(&job.company_logo_url)
    .fetch_one(&state.db)
    .await?;

    info!("Job {} ({}) posted by {}", row.id, row.title, user.id);
    Ok((StatusCode::CREATED, Json(row)))
}

/// PUT /api/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(job): ApiJson<JobPosting>,
) -> Result<Json<JobRow>, AppError> {
    user.require(Operation::PostJob)?;
    let existing = load_job(&state, id).await?;
    require_owner(&existing, &user)?;
    let status = job.validate()?;

    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            title = $2, company = $3, location = $4, country = $5, description = $6,
            requirements = $7, responsibilities = $8, benefits = $9, salary_range = $10,
            job_type = $11, skills = $12, application_deadline = $13, status = $14,
            company_logo_url = $15, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(job.title.trim())
    .bind(job.company.trim())
    .bind(job.location.trim())
    .bind(job.country.trim())
    .bind(&job.description)
    .bind(&job.requirements)
    .bind(&job.responsibilities)
    .bind(&job.benefits)
    .bind(&job.salary_range)
    .bind(&job.job_type)
    .bind(&job.skills)
    .bind(job.application_deadline)
    .bind(status)
    .bind(&job.company_logo_url)
    .fetch_one(&state.db)
    .await?;

    info!("Job {id} updated by {}", user.id);
    Ok(Json(row))
}

/// DELETE /api/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::PostJob)?;
    let existing = load_job(&state, id).await?;
    require_owner(&existing, &user)?;

    sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    info!("Job {id} deleted by {}", user.id);
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Resumes
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/jobs/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    user.require(Operation::ManageResumes)?;
    let browse_all = is_allowed(user.role, Operation::BrowseCandidateResumes);

    let rows = sqlx::query_as::<_, ResumeRow>(
        r#"
        SELECT * FROM resumes
        WHERE ($1 AND is_active) OR user_id = $2
        ORDER BY updated_at DESC
        "#,
    )
    .bind(browse_all)
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/jobs/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    user.require(Operation::ManageResumes)?;
    let resume = load_visible_resume(&state, &user, id).await?;
    Ok(Json(resume))
}

async fn load_visible_resume(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
) -> Result<ResumeRow, AppError> {
    let resume = sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    let visible = resume.user_id == user.id
        || (resume.is_active
            && is_allowed(user.role, Operation::BrowseCandidateResumes));
    if !visible {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    Ok(resume)
}

#[derive(Debug, Deserialize)]
pub struct ResumeDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub skills: Option<String>,
    pub education: Option<String>,
    pub experience: Option<String>,
    pub is_active: Option<bool>,
}

/// POST /api/jobs/resumes
pub async fn handle_create_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<ResumeDetails>,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    user.require(Operation::ManageResumes)?;
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Resume title is required".to_string()))?;

    let row = sqlx::query_as::<_, ResumeRow>(
        r#"
        INSERT INTO resumes (id, user_id, title, description, skills, education, experience,
                             is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(title)
    .bind(&req.description)
    .bind(req.skills.as_deref().unwrap_or_default())
    .bind(req.education.as_deref().unwrap_or_default())
    .bind(req.experience.as_deref().unwrap_or_default())
    .bind(req.is_active.unwrap_or(true))
    .fetch_one(&state.db)
    .await?;

    info!("Resume {} created for user {}", row.id, user.id);
    Ok((StatusCode::CREATED, Json(row)))
}

/// PATCH /api/jobs/resumes/:id
pub async fn handle_update_resume(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ResumeDetails>,
) -> Result<Json<ResumeRow>, AppError> {
    user.require(Operation::ManageResumes)?;
    if matches!(req.title.as_deref(), Some(t) if t.trim().is_empty()) {
        return Err(AppError::Validation("Resume title may not be blank".to_string()));
    }

    let row = sqlx::query_as::<_, ResumeRow>(
        r#"
        UPDATE resumes SET
            title       = COALESCE($3, title),
            description = COALESCE($4, description),
            skills      = COALESCE($5, skills),
            education   = COALESCE($6, education),
            experience  = COALESCE($7, experience),
            is_active   = COALESCE($8, is_active),
            updated_at  = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.id)
    .bind(req.title.as_deref().map(str::trim))
    .bind(&req.description)
    .bind(&req.skills)
    .bind(&req.education)
    .bind(&req.experience)
    .bind(req.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    Ok(Json(row))
}

/// POST /api/jobs/resumes/:id/file
///
/// Multipart form with a single `file` part.
pub async fn handle_upload_resume_file(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ResumeRow>, AppError> {
    user.require(Operation::ManageResumes)?;
    let previous_key: Option<String> =
        sqlx::query_scalar("SELECT s3_key FROM resumes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("resume").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, content_type, data));
        break;
    }
    let (file_name, content_type, data) = upload
        .ok_or_else(|| AppError::Validation("Multipart field 'file' is required".to_string()))?;

    check_upload(&file_name, data.len(), state.config.max_resume_upload_bytes)?;

    let key = resume_object_key(user.id, id, &file_name);
    put_resume_file(
        &state.s3,
        &state.config.s3_bucket,
        ResumeFile {
            key: &key,
            content_type: &content_type,
            data,
        },
    )
    .await?;
    let url = object_url(&state.config.s3_endpoint, &state.config.s3_bucket, &key);

    let row = sqlx::query_as::<_, ResumeRow>(
        r#"
        UPDATE resumes SET resume_url = $2, s3_key = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&url)
    .bind(&key)
    .fetch_one(&state.db)
    .await?;

    if let Some(stale) = replaced_object_key(previous_key.as_deref(), &key) {
        if let Err(e) = delete_resume_file(&state.s3, &state.config.s3_bucket, stale).await {
            warn!("Resume {id} kept a stale object {stale}: {e}");
        }
    }

    Ok(Json(row))
}

// ────────────────────────────────────────────────────────────────────────────
// Applications
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub resume_id: Option<Uuid>,
    #[serde(default)]
    pub cover_letter: String,
}

/// POST /api/jobs/:id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(job_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ApplyRequest>,
) -> Result<(StatusCode, Json<JobApplicationRow>), AppError> {
    user.require(Operation::ApplyForJob)?;
    let job = load_job(&state, job_id).await?;
    if job.status != "OPEN" {
        return Err(AppError::Validation(format!(
            "Job {} is not accepting applications",
            job.title
        )));
    }
    if let Some(resume_id) = req.resume_id {
        let owns: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM resumes WHERE id = $1 AND user_id = $2)",
        )
        .bind(resume_id)
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;
        if !owns {
            return Err(AppError::Validation(format!(
                "Resume {resume_id} does not belong to you"
            )));
        }
    }

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO job_applications (id, job_id, applicant_id, resume_id, cover_letter)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(job_id)
    .bind(user.id)
    .bind(req.resume_id)
    .bind(&req.cover_letter)
    .execute(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, "You have already applied for this job"))?;

    info!("User {} applied for job {job_id}", user.id);
    let row = load_application(&state, id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn load_application(state: &AppState, id: Uuid) -> Result<JobApplicationRow, AppError> {
    let sql = format!("{APPLICATION_SELECT} WHERE a.id = $1");
    sqlx::query_as::<_, JobApplicationRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct ApplicationFilter {
    pub status: Option<String>,
    pub job: Option<Uuid>,
}

/// GET /api/jobs/applications
///
/// Employers see applications to their own jobs; everyone else sees their own.
pub async fn handle_list_applications(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Json<Vec<JobApplicationRow>>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let as_employer = user.role == Role::Employer;
    let status = filter.status.map(|s| s.trim().to_ascii_uppercase());

    let sql = format!(
        r#"{APPLICATION_SELECT}
        WHERE (CASE WHEN $1 THEN j.posted_by = $2 ELSE a.applicant_id = $2 END)
          AND ($3::text IS NULL OR a.status = $3)
          AND ($4::uuid IS NULL OR a.job_id = $4)
        ORDER BY a.applied_at DESC"#
    );
    let rows = sqlx::query_as::<_, JobApplicationRow>(&sql)
        .bind(as_employer)
        .bind(user.id)
        .bind(status)
        .bind(filter.job)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

/// GET /api/jobs/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<JobApplicationRow>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let row = load_application(&state, id).await?;
    if row.applicant_id != user.id && row.job_owner != user.id && user.role != Role::Superuser {
        return Err(AppError::NotFound(format!("Application {id} not found")));
    }
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    pub employer_notes: Option<String>,
}

/// PATCH /api/jobs/applications/:id/status
pub async fn handle_update_application_status(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<StatusUpdate>,
) -> Result<Json<JobApplicationRow>, AppError> {
    user.require(Operation::ReviewApplications)?;
    let current = load_application(&state, id).await?;
    if current.job_owner != user.id && user.role != Role::Superuser {
        return Err(AppError::forbidden(
            "Only the employer who posted this job may review its applications",
        ));
    }
    let next = transition(&current.status, &req.status)?;

    sqlx::query(
        r#"
        UPDATE job_applications
        SET status = $2, employer_notes = COALESCE($3, employer_notes), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(next.as_str())
    .bind(&req.employer_notes)
    .execute(&state.db)
    .await?;

    info!("Application {id}: {} -> {next}", current.status);
    Ok(Json(load_application(&state, id).await?))
}
