use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{CurrentUser, Operation, Role};
use crate::errors::{conflict_on_unique, AppError};
use crate::extract::{ApiJson, ApiPath};
use crate::lms::content::{
    group_lessons, AssignmentUpdate, LessonUpdate, ModuleDetail, ModuleUpdate, NewLesson,
    NewModule,
};
use crate::lms::grading::{
    submission_status, validate_awarded_points, CourseGradeEntry, GradeUpdate, NewAssignment,
    NewCourse, SubmissionStatus,
};
use crate::models::lms::{AssignmentRow, CourseRow, GradeRow, LessonRow, ModuleRow, SubmissionRow};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Shared lookups
// ────────────────────────────────────────────────────────────────────────────

async fn load_course(state: &AppState, course_id: Uuid) -> Result<CourseRow, AppError> {
    sqlx::query_as::<_, CourseRow>("SELECT * FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course {course_id} not found")))
}

async fn load_assignment(state: &AppState, assignment_id: Uuid) -> Result<AssignmentRow, AppError> {
    sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignments WHERE id = $1")
        .bind(assignment_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Assignment {assignment_id} not found")))
}

async fn load_module(state: &AppState, module_id: Uuid) -> Result<ModuleRow, AppError> {
    sqlx::query_as::<_, ModuleRow>("SELECT * FROM course_modules WHERE id = $1")
        .bind(module_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Module {module_id} not found")))
}

async fn load_lesson(state: &AppState, lesson_id: Uuid) -> Result<LessonRow, AppError> {
    sqlx::query_as::<_, LessonRow>("SELECT * FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson {lesson_id} not found")))
}

async fn lessons_of(state: &AppState, module_ids: &[Uuid]) -> Result<Vec<LessonRow>, AppError> {
    Ok(sqlx::query_as::<_, LessonRow>(
        "SELECT * FROM lessons WHERE module_id = ANY($1) ORDER BY position, id",
    )
    .bind(module_ids)
    .fetch_all(&state.db)
    .await?)
}

fn require_instructor(course: &CourseRow, user: &CurrentUser) -> Result<(), AppError> {
    if course.instructor_id == user.id || user.role == Role::Superuser {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "Only the instructor of {} may do this",
            course.code
        )))
    }
}

async fn is_enrolled(
    state: &AppState,
    course_id: Uuid,
    student_id: Uuid,
) -> Result<bool, AppError> {
    Ok(sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM course_enrollments WHERE course_id = $1 AND student_id = $2)",
    )
    .bind(course_id)
    .bind(student_id)
    .fetch_one(&state.db)
    .await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Courses
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/lms/courses
pub async fn handle_list_courses(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<CourseRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;

    let rows = if user.role == Role::Lecturer {
        sqlx::query_as::<_, CourseRow>(
            "SELECT * FROM courses WHERE instructor_id = $1 ORDER BY start_date DESC, title",
        )
        .bind(user.id)
        .fetch_all(&state.db)
        .await?
    } else if user.role.is_student() {
        sqlx::query_as::<_, CourseRow>(
            r#"
            SELECT c.* FROM courses c
            JOIN course_enrollments e ON e.course_id = c.id
            WHERE e.student_id = $1
            ORDER BY c.start_date DESC, c.title
            "#,
        )
        .bind(user.id)
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, CourseRow>("SELECT * FROM courses ORDER BY start_date DESC, title")
            .fetch_all(&state.db)
            .await?
    };
    Ok(Json(rows))
}

/// GET /api/lms/courses/:id
pub async fn handle_get_course(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<CourseRow>, AppError> {
    user.require(Operation::ViewCatalog)?;
    Ok(Json(load_course(&state, id).await?))
}

/// POST /api/lms/courses
pub async fn handle_create_course(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<NewCourse>,
) -> Result<(StatusCode, Json<CourseRow>), AppError> {
    user.require(Operation::CreateCourse)?;
    req.validate()?;

    let course = sqlx::query_as::<_, CourseRow>(
        r#"
        INSERT INTO courses (id, title, code, description, institution, instructor_id,
                             semester, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.title.trim())
    .bind(req.code.trim())
    .bind(&req.description)
    .bind(&req.institution)
    .bind(user.id)
    .bind(&req.semester)
    .bind(req.start_date)
    .bind(req.end_date)
    .fetch_one(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, "A course with this code already exists"))?;

    info!("Course {} ({}) created by {}", course.id, course.code, user.id);
    Ok((StatusCode::CREATED, Json(course)))
}

/// POST /api/lms/courses/:id/enroll
pub async fn handle_enroll(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::EnrollInCourse)?;
    let course = load_course(&state, id).await?;
    if !course.is_active {
        return Err(AppError::Validation(format!(
            "Course {} is not open for enrollment",
            course.code
        )));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO course_enrollments (course_id, student_id) VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(id)
    .bind(user.id)
    .execute(&state.db)
    .await?
    .rows_affected();
    if inserted == 0 {
        return Err(AppError::Validation(
            "You are already enrolled in this course".to_string(),
        ));
    }

    info!("Student {} enrolled in course {id}", user.id);
    Ok(StatusCode::CREATED)
}

/// POST /api/lms/courses/:id/withdraw
pub async fn handle_withdraw(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::EnrollInCourse)?;
    load_course(&state, id).await?;

    let removed =
        sqlx::query("DELETE FROM course_enrollments WHERE course_id = $1 AND student_id = $2")
            .bind(id)
            .bind(user.id)
            .execute(&state.db)
            .await?
            .rows_affected();
    if removed == 0 {
        return Err(AppError::Validation(
            "You are not enrolled in this course".to_string(),
        ));
    }

    info!("Student {} withdrew from course {id}", user.id);
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Modules and assignments
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/lms/courses/:id/modules
pub async fn handle_list_modules(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<ModuleDetail>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    load_course(&state, id).await?;
    let modules = sqlx::query_as::<_, ModuleRow>(
        "SELECT * FROM course_modules WHERE course_id = $1 ORDER BY position, id",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;
    let ids: Vec<Uuid> = modules.iter().map(|m| m.id).collect();
    let lessons = lessons_of(&state, &ids).await?;
    Ok(Json(group_lessons(modules, lessons)))
}

/// POST /api/lms/courses/:id/modules
pub async fn handle_create_module(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NewModule>,
) -> Result<(StatusCode, Json<ModuleRow>), AppError> {
    user.require(Operation::ManageCourseContent)?;
    let course = load_course(&state, id).await?;
    require_instructor(&course, &user)?;
    req.validate()?;

    let row = sqlx::query_as::<_, ModuleRow>(
        r#"
        INSERT INTO course_modules (id, course_id, title, description, position, release_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(req.position)
    .bind(req.release_date)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/lms/modules/:id
pub async fn handle_get_module(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ModuleDetail>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let module = load_module(&state, id).await?;
    let lessons = lessons_of(&state, &[id]).await?;
    let mut outline = group_lessons(vec![module], lessons);
    outline
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Module {id} not found")))
}

/// PATCH /api/lms/modules/:id
pub async fn handle_update_module(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<ModuleUpdate>,
) -> Result<Json<ModuleRow>, AppError> {
    user.require(Operation::ManageCourseContent)?;
    let module = load_module(&state, id).await?;
    require_instructor(&load_course(&state, module.course_id).await?, &user)?;
    update.validate()?;

    let row = sqlx::query_as::<_, ModuleRow>(
        r#"
        UPDATE course_modules SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            position = COALESCE($4, position),
            release_date = COALESCE($5, release_date)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(update.title.as_deref().map(str::trim))
    .bind(&update.description)
    .bind(update.position)
    .bind(update.release_date)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(row))
}

/// DELETE /api/lms/modules/:id
pub async fn handle_delete_module(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::ManageCourseContent)?;
    let module = load_module(&state, id).await?;
    require_instructor(&load_course(&state, module.course_id).await?, &user)?;

    sqlx::query("DELETE FROM course_modules WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    info!("Module {id} removed from course {} by {}", module.course_id, user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/lms/modules/:id/lessons
pub async fn handle_create_lesson(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NewLesson>,
) -> Result<(StatusCode, Json<LessonRow>), AppError> {
    user.require(Operation::ManageCourseContent)?;
    let module = load_module(&state, id).await?;
    require_instructor(&load_course(&state, module.course_id).await?, &user)?;
    req.validate()?;

    let row = sqlx::query_as::<_, LessonRow>(
        r#"
        INSERT INTO lessons (id, module_id, title, content, position, duration_minutes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(req.title.trim())
    .bind(&req.content)
    .bind(req.position)
    .bind(req.duration_minutes)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/lms/lessons/:id
pub async fn handle_get_lesson(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<LessonRow>, AppError> {
    user.require(Operation::ViewCatalog)?;
    Ok(Json(load_lesson(&state, id).await?))
}

/// Resolves the course a lesson belongs to and checks the caller teaches it.
async fn require_lesson_instructor(
    state: &AppState,
    user: &CurrentUser,
    lesson_id: Uuid,
) -> Result<LessonRow, AppError> {
    let lesson = load_lesson(state, lesson_id).await?;
    let module = load_module(state, lesson.module_id).await?;
    require_instructor(&load_course(state, module.course_id).await?, user)?;
    Ok(lesson)
}

/// PATCH /api/lms/lessons/:id
pub async fn handle_update_lesson(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<LessonUpdate>,
) -> Result<Json<LessonRow>, AppError> {
    user.require(Operation::ManageCourseContent)?;
    require_lesson_instructor(&state, &user, id).await?;
    update.validate()?;

    let row = sqlx::query_as::<_, LessonRow>(
        r#"
        UPDATE lessons SET
            title = COALESCE($2, title),
            content = COALESCE($3, content),
            position = COALESCE($4, position),
            duration_minutes = COALESCE($5, duration_minutes)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(update.title.as_deref().map(str::trim))
    .bind(&update.content)
    .bind(update.position)
    .bind(update.duration_minutes)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(row))
}

/// DELETE /api/lms/lessons/:id
pub async fn handle_delete_lesson(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::ManageCourseContent)?;
    require_lesson_instructor(&state, &user, id).await?;
    sqlx::query("DELETE FROM lessons WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/lms/courses/:id/assignments
pub async fn handle_list_assignments(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<AssignmentRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    load_course(&state, id).await?;
    let rows = sqlx::query_as::<_, AssignmentRow>(
        "SELECT * FROM assignments WHERE course_id = $1 ORDER BY due_date, title",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// POST /api/lms/courses/:id/assignments
pub async fn handle_create_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NewAssignment>,
) -> Result<(StatusCode, Json<AssignmentRow>), AppError> {
    user.require(Operation::ManageCourseContent)?;
    let course = load_course(&state, id).await?;
    require_instructor(&course, &user)?;
    req.validate()?;

    let row = sqlx::query_as::<_, AssignmentRow>(
        r#"
        INSERT INTO assignments (id, course_id, title, description, due_date, total_points)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(req.due_date)
    .bind(req.total_points)
    .fetch_one(&state.db)
    .await?;

    info!("Assignment {} added to course {id}", row.id);
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/lms/assignments/:id
pub async fn handle_get_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<AssignmentRow>, AppError> {
    user.require(Operation::ViewCatalog)?;
    Ok(Json(load_assignment(&state, id).await?))
}

/// PATCH /api/lms/assignments/:id
pub async fn handle_update_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<AssignmentUpdate>,
) -> Result<Json<AssignmentRow>, AppError> {
    user.require(Operation::ManageCourseContent)?;
    let assignment = load_assignment(&state, id).await?;
    require_instructor(&load_course(&state, assignment.course_id).await?, &user)?;
    update.validate()?;

    let row = sqlx::query_as::<_, AssignmentRow>(
        r#"
        UPDATE assignments SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            due_date = COALESCE($4, due_date),
            total_points = COALESCE($5, total_points)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(update.title.as_deref().map(str::trim))
    .bind(&update.description)
    .bind(update.due_date)
    .bind(update.total_points)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(row))
}

/// DELETE /api/lms/assignments/:id
pub async fn handle_delete_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::ManageCourseContent)?;
    let assignment = load_assignment(&state, id).await?;
    require_instructor(&load_course(&state, assignment.course_id).await?, &user)?;

    sqlx::query("DELETE FROM assignments WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    info!("Assignment {id} deleted by {}", user.id);
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Submissions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NewSubmission {
    pub content: String,
    pub files_url: Option<String>,
}

/// POST /api/lms/assignments/:id/submissions
///
/// A second submission replaces the first and clears any grade on it.
pub async fn handle_submit_assignment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NewSubmission>,
) -> Result<(StatusCode, Json<SubmissionRow>), AppError> {
    user.require(Operation::SubmitAssignment)?;
    let assignment = load_assignment(&state, id).await?;
    if !is_enrolled(&state, assignment.course_id, user.id).await? {
        return Err(AppError::forbidden("You are not enrolled in this course"));
    }
    if req.content.trim().is_empty() && req.files_url.is_none() {
        return Err(AppError::Validation(
            "A submission needs content or a file".to_string(),
        ));
    }

    let now = Utc::now();
    let status = submission_status(now, assignment.due_date);

    let row = sqlx::query_as::<_, SubmissionRow>(
        r#"
        INSERT INTO submissions (id, assignment_id, student_id, content, files_url, status,
                                 submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (assignment_id, student_id) DO UPDATE
            SET content = EXCLUDED.content,
                files_url = EXCLUDED.files_url,
                status = EXCLUDED.status,
                submitted_at = EXCLUDED.submitted_at,
                points_earned = NULL,
                feedback = NULL
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(user.id)
    .bind(&req.content)
    .bind(&req.files_url)
    .bind(status.as_str())
    .bind(now)
    .fetch_one(&state.db)
    .await?;

    info!(
        "Submission {} for assignment {id} by {} ({})",
        row.id,
        user.id,
        status.as_str()
    );
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/lms/assignments/:id/submissions
pub async fn handle_list_submissions(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<SubmissionRow>>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let assignment = load_assignment(&state, id).await?;
    let course = load_course(&state, assignment.course_id).await?;

    let instructor_view = require_instructor(&course, &user).is_ok();
    let rows = sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT * FROM submissions
        WHERE assignment_id = $1 AND ($2 OR student_id = $3)
        ORDER BY submitted_at
        "#,
    )
    .bind(id)
    .bind(instructor_view)
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/lms/submissions/:id
///
/// Visible to the submitting student and the course instructor; anyone else
/// gets 404.
pub async fn handle_get_submission(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SubmissionRow>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let not_found = || AppError::NotFound(format!("Submission {id} not found"));
    let row = sqlx::query_as::<_, SubmissionRow>("SELECT * FROM submissions WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(not_found)?;

    if row.student_id != user.id {
        let assignment = load_assignment(&state, row.assignment_id).await?;
        let course = load_course(&state, assignment.course_id).await?;
        require_instructor(&course, &user).map_err(|_| not_found())?;
    }
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct GradeSubmission {
    pub points_earned: f64,
    pub feedback: Option<String>,
}

/// POST /api/lms/submissions/:id/grade
pub async fn handle_grade_submission(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<GradeSubmission>,
) -> Result<Json<SubmissionRow>, AppError> {
    user.require(Operation::GradeStudents)?;

    let assignment_id: Uuid =
        sqlx::query_scalar("SELECT assignment_id FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))?;
    let assignment = load_assignment(&state, assignment_id).await?;
    let course = load_course(&state, assignment.course_id).await?;
    require_instructor(&course, &user)?;
    validate_awarded_points(req.points_earned, assignment.total_points)?;

    let row = sqlx::query_as::<_, SubmissionRow>(
        r#"
        UPDATE submissions
        SET points_earned = $2, feedback = $3, status = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.points_earned)
    .bind(&req.feedback)
    .bind(SubmissionStatus::Graded.as_str())
    .fetch_one(&state.db)
    .await?;

    info!(
        "Submission {id} graded {}/{} by {}",
        req.points_earned, assignment.total_points, user.id
    );
    Ok(Json(row))
}

// ────────────────────────────────────────────────────────────────────────────
// Course grades
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/lms/courses/:id/grades
pub async fn handle_list_grades(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<GradeRow>>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let course = load_course(&state, id).await?;

    let instructor_view = require_instructor(&course, &user).is_ok();
    if !instructor_view && !user.role.is_student() {
        return Err(AppError::forbidden(
            "Only the instructor and students can view grades",
        ));
    }

    let rows = sqlx::query_as::<_, GradeRow>(
        r#"
        SELECT * FROM grades
        WHERE course_id = $1 AND ($2 OR student_id = $3)
        ORDER BY created_at
        "#,
    )
    .bind(id)
    .bind(instructor_view)
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// POST /api/lms/courses/:id/grades
pub async fn handle_record_grade(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(entry): ApiJson<CourseGradeEntry>,
) -> Result<Json<GradeRow>, AppError> {
    user.require(Operation::GradeStudents)?;
    let course = load_course(&state, id).await?;
    require_instructor(&course, &user)?;
    let letter = entry.letter()?;
    if !is_enrolled(&state, id, entry.student_id).await? {
        return Err(AppError::Validation(format!(
            "Student {} is not enrolled in {}",
            entry.student_id, course.code
        )));
    }

    let row = sqlx::query_as::<_, GradeRow>(
        r#"
        INSERT INTO grades (id, student_id, course_id, points_earned, points_possible,
                            grade_letter, comments)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (student_id, course_id) DO UPDATE
            SET points_earned = EXCLUDED.points_earned,
                points_possible = EXCLUDED.points_possible,
                grade_letter = EXCLUDED.grade_letter,
                comments = EXCLUDED.comments
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.student_id)
    .bind(id)
    .bind(entry.points_earned)
    .bind(entry.points_possible)
    .bind(letter)
    .bind(&entry.comments)
    .fetch_one(&state.db)
    .await?;

    info!(
        "Grade {letter} recorded for student {} in course {id}",
        entry.student_id
    );
    Ok(Json(row))
}

async fn load_grade(state: &AppState, grade_id: Uuid) -> Result<GradeRow, AppError> {
    sqlx::query_as::<_, GradeRow>("SELECT * FROM grades WHERE id = $1")
        .bind(grade_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Grade {grade_id} not found")))
}

/// GET /api/lms/grades/:id
pub async fn handle_get_grade(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<GradeRow>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let grade = load_grade(&state, id).await?;
    if grade.student_id != user.id {
        let course = load_course(&state, grade.course_id).await?;
        require_instructor(&course, &user)
            .map_err(|_| AppError::NotFound(format!("Grade {id} not found")))?;
    }
    Ok(Json(grade))
}

/// PATCH /api/lms/grades/:id
pub async fn handle_update_grade(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<GradeUpdate>,
) -> Result<Json<GradeRow>, AppError> {
    user.require(Operation::GradeStudents)?;
    let grade = load_grade(&state, id).await?;
    require_instructor(&load_course(&state, grade.course_id).await?, &user)?;
    let (earned, possible, letter) = update.resolve(grade.points_earned, grade.points_possible)?;

    let row = sqlx::query_as::<_, GradeRow>(
        r#"
        UPDATE grades SET
            points_earned = $2,
            points_possible = $3,
            grade_letter = $4,
            comments = COALESCE($5, comments)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(earned)
    .bind(possible)
    .bind(letter)
    .bind(&update.comments)
    .fetch_one(&state.db)
    .await?;

    info!("Grade {id} revised to {letter} by {}", user.id);
    Ok(Json(row))
}

/// DELETE /api/lms/grades/:id
pub async fn handle_delete_grade(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::GradeStudents)?;
    let grade = load_grade(&state, id).await?;
    require_instructor(&load_course(&state, grade.course_id).await?, &user)?;
    sqlx::query("DELETE FROM grades WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    info!("Grade {id} deleted by {}", user.id);
    Ok(StatusCode::NO_CONTENT)
}
