use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::auth::{CurrentUser, Operation, Role};
use crate::errors::{conflict_on_unique, AppError};
use crate::extract::{ApiJson, ApiPath};
use crate::learning::catalog::{
    distinct_ids, merge_recommendations, NewResource, ResourceUpdate, RECOMMENDED_RESOURCE_LIMIT,
};
use crate::learning::progress::{apply_update, CurrentProgress, ProgressStatus, ProgressUpdate};
use crate::learning::tracks::{
    assemble_track_resources, check_position, track_completion, NewTrack, NewTrackResource,
    TrackDetail, TrackResourceUpdate, TrackUpdate,
};
use crate::models::learning::{
    LearningCategoryRow, LearningResourceRow, LearningTrackRow, TrackProgressRow, TrackResourceRow,
    TrackSummaryRow, UserProgressRow,
};
use crate::state::AppState;

const LINK_RESOURCE_CATEGORIES: &str = r#"
    INSERT INTO resource_categories (resource_id, category_id)
    SELECT $1, c.id FROM learning_categories c WHERE c.id = ANY($2)
"#;

const LINK_TRACK_CATEGORIES: &str = r#"
    INSERT INTO track_categories (track_id, category_id)
    SELECT $1, c.id FROM learning_categories c WHERE c.id = ANY($2)
"#;

/// Links `owner_id` to each distinct category; unknown ids are a 400.
async fn link_categories(
    conn: &mut PgConnection,
    link_sql: &str,
    owner_id: Uuid,
    categories: &[Uuid],
) -> Result<(), AppError> {
    let categories = distinct_ids(categories);
    if categories.is_empty() {
        return Ok(());
    }
    let linked = sqlx::query(link_sql)
        .bind(owner_id)
        .bind(&categories)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if linked as usize != categories.len() {
        return Err(AppError::Validation(
            "One or more categories do not exist".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/learning/categories
pub async fn handle_list_categories(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<LearningCategoryRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let rows =
        sqlx::query_as::<_, LearningCategoryRow>("SELECT * FROM learning_categories ORDER BY name")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(rows))
}

// ────────────────────────────────────────────────────────────────────────────
// Resources
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResourceFilter {
    pub provider: Option<String>,
    pub resource_type: Option<String>,
    pub difficulty: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
}

/// GET /api/learning/resources
pub async fn handle_list_resources(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<ResourceFilter>,
) -> Result<Json<Vec<LearningResourceRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let q = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let rows = sqlx::query_as::<_, LearningResourceRow>(
        r#"
        SELECT r.* FROM learning_resources r
        WHERE ($1::text IS NULL OR r.provider = $1)
          AND ($2::text IS NULL OR r.resource_type = $2)
          AND ($3::text IS NULL OR r.difficulty_level = $3)
          AND ($4::text IS NULL OR EXISTS (
                SELECT 1 FROM resource_categories rc
                JOIN learning_categories c ON c.id = rc.category_id
                WHERE rc.resource_id = r.id AND c.slug = $4))
          AND ($5::text IS NULL
               OR r.title ILIKE '%' || $5 || '%'
               OR r.description ILIKE '%' || $5 || '%'
               OR r.skills ILIKE '%' || $5 || '%')
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(filter.provider)
    .bind(filter.resource_type)
    .bind(filter.difficulty)
    .bind(filter.category)
    .bind(q)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/learning/resources/:id
///
/// Viewing a resource starts tracking it for the caller (NOT_STARTED).
pub async fn handle_get_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<LearningResourceRow>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let resource =
        sqlx::query_as::<_, LearningResourceRow>("SELECT * FROM learning_resources WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {id} not found")))?;

    sqlx::query(
        r#"
        INSERT INTO user_progress (id, user_id, resource_id, status)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, resource_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(id)
    .bind(ProgressStatus::NotStarted.as_str())
    .execute(&state.db)
    .await?;

    Ok(Json(resource))
}

/// POST /api/learning/resources
pub async fn handle_create_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<NewResource>,
) -> Result<(StatusCode, Json<LearningResourceRow>), AppError> {
    user.require(Operation::PublishLearningResource)?;
    req.validate()?;

    let mut tx = state.db.begin().await?;

    let row = sqlx::query_as::<_, LearningResourceRow>(
        r#"
        INSERT INTO learning_resources (id, title, description, provider, resource_type, url,
                                        thumbnail_url, duration, difficulty_level, skills)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(&req.provider)
    .bind(&req.resource_type)
    .bind(&req.url)
    .bind(&req.thumbnail_url)
    .bind(&req.duration)
    .bind(&req.difficulty_level)
    .bind(&req.skills)
    .fetch_one(&mut *tx)
    .await?;

    link_categories(&mut tx, LINK_RESOURCE_CATEGORIES, row.id, &req.categories).await?;
    tx.commit().await?;

    info!("Learning resource {} published by {}", row.id, user.id);
    Ok((StatusCode::CREATED, Json(row)))
}

/// PATCH /api/learning/resources/:id
pub async fn handle_update_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<ResourceUpdate>,
) -> Result<Json<LearningResourceRow>, AppError> {
    user.require(Operation::PublishLearningResource)?;
    update.validate()?;

    let mut tx = state.db.begin().await?;

    let row = sqlx::query_as::<_, LearningResourceRow>(
        r#"
        UPDATE learning_resources SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            provider = COALESCE($4, provider),
            resource_type = COALESCE($5, resource_type),
            url = COALESCE($6, url),
            thumbnail_url = COALESCE($7, thumbnail_url),
            duration = COALESCE($8, duration),
            difficulty_level = COALESCE($9, difficulty_level),
            skills = COALESCE($10, skills),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(update.title.as_deref().map(str::trim))
    .bind(&update.description)
    .bind(&update.provider)
    .bind(&update.resource_type)
    .bind(&update.url)
    .bind(&update.thumbnail_url)
    .bind(&update.duration)
    .bind(&update.difficulty_level)
    .bind(&update.skills)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Resource {id} not found")))?;

    if let Some(categories) = &update.categories {
        sqlx::query("DELETE FROM resource_categories WHERE resource_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_categories(&mut tx, LINK_RESOURCE_CATEGORIES, id, categories).await?;
    }

    tx.commit().await?;

    info!("Learning resource {id} updated by {}", user.id);
    Ok(Json(row))
}

/// DELETE /api/learning/resources/:id
pub async fn handle_delete_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::PublishLearningResource)?;
    let deleted = sqlx::query("DELETE FROM learning_resources WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::NotFound(format!("Resource {id} not found")));
    }
    info!("Learning resource {id} deleted by {}", user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/learning/resources/recommended
pub async fn handle_recommended_resources(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<LearningResourceRow>>, AppError> {
    user.require(Operation::TrackLearningProgress)?;
    let limit = RECOMMENDED_RESOURCE_LIMIT as i64;

    let similar = sqlx::query_as::<_, LearningResourceRow>(
        r#"
        SELECT r.* FROM learning_resources r
        WHERE NOT EXISTS (
                SELECT 1 FROM user_progress p WHERE p.user_id = $1 AND p.resource_id = r.id)
          AND EXISTS (
                SELECT 1 FROM resource_categories rc
                JOIN resource_categories seen_rc ON seen_rc.category_id = rc.category_id
                JOIN user_progress p ON p.resource_id = seen_rc.resource_id
                WHERE rc.resource_id = r.id AND p.user_id = $1)
        ORDER BY r.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user.id)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    let others = if similar.len() < RECOMMENDED_RESOURCE_LIMIT {
        let picked: Vec<Uuid> = similar.iter().map(|r| r.id).collect();
        sqlx::query_as::<_, LearningResourceRow>(
            r#"
            SELECT r.* FROM learning_resources r
            WHERE NOT EXISTS (
                SELECT 1 FROM user_progress p WHERE p.user_id = $1 AND p.resource_id = r.id)
              AND NOT (r.id = ANY($2))
            ORDER BY r.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user.id)
        .bind(&picked)
        .bind(limit - picked.len() as i64)
        .fetch_all(&state.db)
        .await?
    } else {
        Vec::new()
    };

    Ok(Json(merge_recommendations(
        similar,
        others,
        RECOMMENDED_RESOURCE_LIMIT,
    )))
}

// ────────────────────────────────────────────────────────────────────────────
// Progress
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/learning/progress
pub async fn handle_list_progress(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<UserProgressRow>>, AppError> {
    user.require(Operation::TrackLearningProgress)?;
    let rows = sqlx::query_as::<_, UserProgressRow>(
        "SELECT * FROM user_progress WHERE user_id = $1 ORDER BY last_activity DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

async fn load_own_progress(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
) -> Result<UserProgressRow, AppError> {
    sqlx::query_as::<_, UserProgressRow>(
        "SELECT * FROM user_progress WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Progress record {id} not found")))
}

/// GET /api/learning/progress/:id
pub async fn handle_get_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserProgressRow>, AppError> {
    user.require(Operation::TrackLearningProgress)?;
    Ok(Json(load_own_progress(&state, &user, id).await?))
}

/// PATCH /api/learning/progress/:id
pub async fn handle_update_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<ProgressUpdate>,
) -> Result<Json<UserProgressRow>, AppError> {
    user.require(Operation::TrackLearningProgress)?;
    let existing = load_own_progress(&state, &user, id).await?;

    let change = apply_update(
        CurrentProgress {
            completion_percentage: existing.completion_percentage,
            start_date: existing.start_date,
            completion_date: existing.completion_date,
        },
        &update,
        Utc::now().date_naive(),
    )?;

    let row = sqlx::query_as::<_, UserProgressRow>(
        r#"
        UPDATE user_progress SET
            status = $2,
            completion_percentage = $3,
            start_date = $4,
            completion_date = $5,
            notes = COALESCE($6, notes),
            last_activity = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(change.status.as_str())
    .bind(change.completion_percentage)
    .bind(change.start_date)
    .bind(change.completion_date)
    .bind(&update.notes)
    .fetch_one(&state.db)
    .await?;

    sqlx::query(
        r#"
        UPDATE track_progress tp SET last_activity = NOW()
        FROM track_resources tr
        WHERE tr.track_id = tp.track_id AND tr.resource_id = $2 AND tp.user_id = $1
        "#,
    )
    .bind(user.id)
    .bind(row.resource_id)
    .execute(&state.db)
    .await?;

    info!(
        "Progress {id} for user {}: {} at {}%",
        user.id, change.status, change.completion_percentage
    );
    Ok(Json(row))
}

// ────────────────────────────────────────────────────────────────────────────
// Tracks
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TrackFilter {
    pub difficulty: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
}

/// GET /api/learning/tracks
pub async fn handle_list_tracks(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<TrackFilter>,
) -> Result<Json<Vec<TrackSummaryRow>>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let q = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let rows = sqlx::query_as::<_, TrackSummaryRow>(
        r#"
        SELECT t.id, t.title, t.difficulty_level, t.estimated_completion_time,
               (SELECT COUNT(*) FROM track_resources tr WHERE tr.track_id = t.id)
                   AS resource_count
        FROM learning_tracks t
        WHERE ($1::text IS NULL OR t.difficulty_level = $1)
          AND ($2::text IS NULL OR EXISTS (
                SELECT 1 FROM track_categories tc
                JOIN learning_categories c ON c.id = tc.category_id
                WHERE tc.track_id = t.id AND c.slug = $2))
          AND ($3::text IS NULL
               OR t.title ILIKE '%' || $3 || '%'
               OR t.description ILIKE '%' || $3 || '%'
               OR t.skills_gained ILIKE '%' || $3 || '%')
        ORDER BY t.created_at DESC
        "#,
    )
    .bind(filter.difficulty)
    .bind(filter.category)
    .bind(q)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

async fn load_track(state: &AppState, track_id: Uuid) -> Result<LearningTrackRow, AppError> {
    sqlx::query_as::<_, LearningTrackRow>("SELECT * FROM learning_tracks WHERE id = $1")
        .bind(track_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Track {track_id} not found")))
}

async fn ensure_resource_exists(state: &AppState, resource_id: Uuid) -> Result<(), AppError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM learning_resources WHERE id = $1)")
            .bind(resource_id)
            .fetch_one(&state.db)
            .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Resource {resource_id} does not exist")))
    }
}

fn require_track_owner(track: &LearningTrackRow, user: &CurrentUser) -> Result<(), AppError> {
    if track.created_by == user.id || user.role == Role::Superuser {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "Only the creator of track '{}' may change it",
            track.title
        )))
    }
}

/// Recomputes the caller's stored completion for their tracked tracks (or a
/// single one) from resource progress, then returns the refreshed rows.
async fn refresh_track_progress(
    state: &AppState,
    user_id: Uuid,
    track_id: Option<Uuid>,
) -> Result<Vec<TrackProgressRow>, AppError> {
    let counts = sqlx::query_as::<_, (Uuid, i64, i64)>(
        r#"
        SELECT tp.track_id,
               COUNT(tr.id) AS total,
               COUNT(up.id) FILTER (WHERE up.status = $3) AS completed
        FROM track_progress tp
        LEFT JOIN track_resources tr ON tr.track_id = tp.track_id
        LEFT JOIN user_progress up
               ON up.resource_id = tr.resource_id AND up.user_id = tp.user_id
        WHERE tp.user_id = $1 AND ($2::uuid IS NULL OR tp.track_id = $2)
        GROUP BY tp.track_id
        "#,
    )
    .bind(user_id)
    .bind(track_id)
    .bind(ProgressStatus::Completed.as_str())
    .fetch_all(&state.db)
    .await?;

    for (track, total, completed) in counts {
        sqlx::query(
            r#"
            UPDATE track_progress SET completion_percentage = $3
            WHERE user_id = $1 AND track_id = $2 AND completion_percentage <> $3
            "#,
        )
        .bind(user_id)
        .bind(track)
        .bind(track_completion(completed, total))
        .execute(&state.db)
        .await?;
    }

    Ok(sqlx::query_as::<_, TrackProgressRow>(
        r#"
        SELECT * FROM track_progress
        WHERE user_id = $1 AND ($2::uuid IS NULL OR track_id = $2)
        ORDER BY last_activity DESC
        "#,
    )
    .bind(user_id)
    .bind(track_id)
    .fetch_all(&state.db)
    .await?)
}

/// GET /api/learning/tracks/:id
///
/// Viewing a track starts tracking it for the caller.
pub async fn handle_get_track(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<TrackDetail>, AppError> {
    user.require(Operation::ViewCatalog)?;
    let track = load_track(&state, id).await?;

    let categories = sqlx::query_as::<_, LearningCategoryRow>(
        r#"
        SELECT c.* FROM learning_categories c
        JOIN track_categories tc ON tc.category_id = c.id
        WHERE tc.track_id = $1
        ORDER BY c.name
        "#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let links = sqlx::query_as::<_, TrackResourceRow>(
        "SELECT * FROM track_resources WHERE track_id = $1",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;
    let resources = sqlx::query_as::<_, LearningResourceRow>(
        r#"
        SELECT r.* FROM learning_resources r
        JOIN track_resources tr ON tr.resource_id = r.id
        WHERE tr.track_id = $1
        "#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO track_progress (id, user_id, track_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, track_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(id)
    .execute(&state.db)
    .await?;
    let user_progress = refresh_track_progress(&state, user.id, Some(id))
        .await?
        .pop()
        .map(Into::into);

    Ok(Json(TrackDetail {
        track,
        categories,
        track_resources: assemble_track_resources(links, resources),
        user_progress,
    }))
}

/// POST /api/learning/tracks
pub async fn handle_create_track(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<NewTrack>,
) -> Result<(StatusCode, Json<LearningTrackRow>), AppError> {
    user.require(Operation::PublishLearningResource)?;
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let row = sqlx::query_as::<_, LearningTrackRow>(
        r#"
        INSERT INTO learning_tracks (id, title, description, created_by, difficulty_level,
                                     skills_gained, estimated_completion_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(user.id)
    .bind(&req.difficulty_level)
    .bind(&req.skills_gained)
    .bind(&req.estimated_completion_time)
    .fetch_one(&mut *tx)
    .await?;
    link_categories(&mut tx, LINK_TRACK_CATEGORIES, row.id, &req.categories).await?;
    tx.commit().await?;

    info!("Learning track {} created by {}", row.id, user.id);
    Ok((StatusCode::CREATED, Json(row)))
}

/// PATCH /api/learning/tracks/:id
pub async fn handle_update_track(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<TrackUpdate>,
) -> Result<Json<LearningTrackRow>, AppError> {
    user.require(Operation::PublishLearningResource)?;
    require_track_owner(&load_track(&state, id).await?, &user)?;
    update.validate()?;

    let mut tx = state.db.begin().await?;
    let row = sqlx::query_as::<_, LearningTrackRow>(
        r#"
        UPDATE learning_tracks SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            difficulty_level = COALESCE($4, difficulty_level),
            skills_gained = COALESCE($5, skills_gained),
            estimated_completion_time = COALESCE($6, estimated_completion_time),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(update.title.as_deref().map(str::trim))
    .bind(&update.description)
    .bind(&update.difficulty_level)
    .bind(&update.skills_gained)
    .bind(&update.estimated_completion_time)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(categories) = &update.categories {
        sqlx::query("DELETE FROM track_categories WHERE track_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_categories(&mut tx, LINK_TRACK_CATEGORIES, id, categories).await?;
    }
    tx.commit().await?;

    Ok(Json(row))
}

/// DELETE /api/learning/tracks/:id
pub async fn handle_delete_track(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::PublishLearningResource)?;
    require_track_owner(&load_track(&state, id).await?, &user)?;
    sqlx::query("DELETE FROM learning_tracks WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    info!("Learning track {id} deleted by {}", user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/learning/tracks/:id/resources
pub async fn handle_add_track_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NewTrackResource>,
) -> Result<(StatusCode, Json<TrackResourceRow>), AppError> {
    user.require(Operation::PublishLearningResource)?;
    require_track_owner(&load_track(&state, id).await?, &user)?;
    check_position(Some(req.position))?;
    ensure_resource_exists(&state, req.resource_id).await?;

    let row = sqlx::query_as::<_, TrackResourceRow>(
        r#"
        INSERT INTO track_resources (id, track_id, resource_id, position)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(req.resource_id)
    .bind(req.position)
    .fetch_one(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, "Resource is already part of this track"))?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn load_owned_track_resource(
    state: &AppState,
    user: &CurrentUser,
    link_id: Uuid,
) -> Result<TrackResourceRow, AppError> {
    let link =
        sqlx::query_as::<_, TrackResourceRow>("SELECT * FROM track_resources WHERE id = $1")
            .bind(link_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Track resource {link_id} not found")))?;
    require_track_owner(&load_track(state, link.track_id).await?, user)?;
    Ok(link)
}

/// PATCH /api/learning/track-resources/:id
pub async fn handle_update_track_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<TrackResourceUpdate>,
) -> Result<Json<TrackResourceRow>, AppError> {
    user.require(Operation::PublishLearningResource)?;
    load_owned_track_resource(&state, &user, id).await?;
    check_position(update.position)?;
    if let Some(resource_id) = update.resource_id {
        ensure_resource_exists(&state, resource_id).await?;
    }

    let row = sqlx::query_as::<_, TrackResourceRow>(
        r#"
        UPDATE track_resources SET
            resource_id = COALESCE($2, resource_id),
            position = COALESCE($3, position)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(update.resource_id)
    .bind(update.position)
    .fetch_one(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, "Resource is already part of this track"))?;
    Ok(Json(row))
}

/// DELETE /api/learning/track-resources/:id
pub async fn handle_delete_track_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Operation::PublishLearningResource)?;
    load_owned_track_resource(&state, &user, id).await?;
    sqlx::query("DELETE FROM track_resources WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/learning/progress/tracks
pub async fn handle_list_track_progress(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<TrackProgressRow>>, AppError> {
    user.require(Operation::TrackLearningProgress)?;
    Ok(Json(refresh_track_progress(&state, user.id, None).await?))
}

/// GET /api/learning/progress/tracks/:id
///
/// `id` is the track; the caller must have opened it at least once.
pub async fn handle_get_track_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<TrackProgressRow>, AppError> {
    user.require(Operation::TrackLearningProgress)?;
    refresh_track_progress(&state, user.id, Some(id))
        .await?
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No progress recorded for track {id}")))
}
