use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::profile::{NewProfile, ProfileUpdate, RegisterRequest, SaveItemRequest};
use crate::auth::{uin::generate_uin, CurrentUser, Operation, Subject};
use crate::errors::{conflict_on_unique, AppError};
use crate::extract::{ApiJson, ApiPath};
use crate::models::user::{NotificationRow, SavedItemRow, UserRow};
use crate::state::AppState;

/// Fresh UINs tried before registration gives up.
const UIN_ATTEMPTS: usize = 5;

const UIN_CONSTRAINT: &str = "users_uin_key";

// ────────────────────────────────────────────────────────────────────────────
// Profile
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Subject(user_id): Subject,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserRow>), AppError> {
    let profile = req.validate()?;

    for attempt in 1..=UIN_ATTEMPTS {
        let uin = generate_uin();
        match insert_profile(&state, user_id, &uin, &profile).await {
            Ok(user) => {
                info!(
                    "Registered user {} ({}) with UIN {}",
                    user.id, user.role, user.uin
                );
                return Ok((StatusCode::CREATED, Json(user)));
            }
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(UIN_CONSTRAINT) => {
                warn!("UIN collision on attempt {attempt}, retrying");
            }
            Err(e) => {
                return Err(conflict_on_unique(
                    e,
                    "A user with this email or id already exists",
                ))
            }
        }
    }

    Err(AppError::Internal(anyhow::anyhow!(
        "could not allocate a unique UIN after {UIN_ATTEMPTS} attempts"
    )))
}

async fn insert_profile(
    state: &AppState,
    user_id: Uuid,
    uin: &str,
    profile: &NewProfile,
) -> Result<UserRow, sqlx::Error> {
    let req = &profile.request;
    sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (id, email, full_name, uin, role, approved, phone, institution,
                           school, university, program, company, specialization)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&profile.email)
    .bind(&profile.full_name)
    .bind(uin)
    .bind(profile.role.code())
    .bind(profile.approved)
    .bind(&req.phone)
    .bind(&req.institution)
    .bind(&req.school)
    .bind(&req.university)
    .bind(&req.program)
    .bind(&req.company)
    .bind(&req.specialization)
    .fetch_one(&state.db)
    .await
}

async fn find_user(state: &AppState, user_id: Uuid) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
}

/// GET /api/auth/user
pub async fn handle_get_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UserRow>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    Ok(Json(find_user(&state, user.id).await?))
}

/// PATCH /api/auth/user
pub async fn handle_update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<UserRow>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    update.validate()?;

    let row = sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users SET
            full_name      = COALESCE($2, full_name),
            phone          = COALESCE($3, phone),
            bio            = COALESCE($4, bio),
            school         = COALESCE($5, school),
            university     = COALESCE($6, university),
            program        = COALESCE($7, program),
            company        = COALESCE($8, company),
            specialization = COALESCE($9, specialization)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(update.full_name.as_deref().map(str::trim))
    .bind(&update.phone)
    .bind(&update.bio)
    .bind(&update.school)
    .bind(&update.university)
    .bind(&update.program)
    .bind(&update.company)
    .bind(&update.specialization)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;

    info!("Updated profile for user {}", user.id);
    Ok(Json(row))
}

// ────────────────────────────────────────────────────────────────────────────
// Notifications
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/auth/notifications
pub async fn handle_list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<NotificationRow>>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/auth/notifications/:id
pub async fn handle_get_notification(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<NotificationRow>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    sqlx::query_as::<_, NotificationRow>(
        "SELECT * FROM notifications WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .map(Json)
    .ok_or_else(|| AppError::NotFound(format!("Notification {id} not found")))
}

/// POST /api/auth/notifications/:id/read
pub async fn handle_mark_notification_read(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<NotificationRow>, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    sqlx::query_as::<_, NotificationRow>(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .map(Json)
    .ok_or_else(|| AppError::NotFound(format!("Notification {id} not found")))
}

/// DELETE /api/auth/notifications/:id
pub async fn handle_delete_notification(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::ViewOwnRecords)?;
    let deleted = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::NotFound(format!("Notification {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Saved items
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/auth/saved-items
pub async fn handle_list_saved_items(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<SavedItemRow>>, AppError> {
    user.require(Operation::ManageSavedItems)?;
    let rows = sqlx::query_as::<_, SavedItemRow>(
        "SELECT * FROM saved_items WHERE user_id = $1 ORDER BY saved_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// POST /api/auth/saved-items
pub async fn handle_save_item(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<SaveItemRequest>,
) -> Result<(StatusCode, Json<SavedItemRow>), AppError> {
    user.require(Operation::ManageSavedItems)?;
    let (kind, item_id) = req.validate()?;

    let row = sqlx::query_as::<_, SavedItemRow>(
        r#"
        INSERT INTO saved_items (user_id, item_type, item_id)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(kind.as_str())
    .bind(&item_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, &format!("This {kind} is already saved")))?;

    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/auth/saved-items/:id
pub async fn handle_get_saved_item(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SavedItemRow>, AppError> {
    user.require(Operation::ManageSavedItems)?;
    sqlx::query_as::<_, SavedItemRow>("SELECT * FROM saved_items WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Saved item {id} not found")))
}

/// DELETE /api/auth/saved-items/:id
pub async fn handle_delete_saved_item(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::ManageSavedItems)?;
    let deleted = sqlx::query("DELETE FROM saved_items WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::NotFound(format!("Saved item {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
