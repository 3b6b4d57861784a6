//! Result Store — persistence seam for quiz submissions.
//!
//! Carried in `AppState` as `Arc<dyn CareerStore>`; `PgCareerStore` is the
//! production backend. Both upserts of one submission commit together.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::career::recommend::DraftRecommendation;
use crate::career::traits::TraitScores;
use crate::errors::AppError;
use crate::models::career::{CareerPathRow, CareerQuizRow, QuizResultRow};

/// Everything one quiz submission writes.
pub struct SubmissionParams<'a> {
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub answers: &'a Value,
    pub scores: &'a TraitScores,
    pub recommendations: &'a [DraftRecommendation],
}

#[async_trait]
pub trait CareerStore: Send + Sync {
    async fn find_quiz(&self, quiz_id: Uuid) -> Result<Option<CareerQuizRow>, AppError>;

    /// Raw `career_traits` text for each requested option that exists.
    async fn option_traits(&self, option_ids: &[Uuid]) -> Result<HashMap<Uuid, String>, AppError>;

    /// The first `limit` career paths in catalogue order (title, then id).
    async fn candidate_career_paths(&self, limit: usize) -> Result<Vec<CareerPathRow>, AppError>;

    /// Upserts the (user, quiz) result and every (user, career_path)
    /// recommendation atomically, returning the stored result.
    async fn save_submission(&self, params: SubmissionParams<'_>)
        -> Result<QuizResultRow, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL backend
// ────────────────────────────────────────────────────────────────────────────

pub struct PgCareerStore {
    pool: PgPool,
}

impl PgCareerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CareerStore for PgCareerStore {
    async fn find_quiz(&self, quiz_id: Uuid) -> Result<Option<CareerQuizRow>, AppError> {
        Ok(
            sqlx::query_as::<_, CareerQuizRow>("SELECT * FROM career_quizzes WHERE id = $1")
                .bind(quiz_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn option_traits(&self, option_ids: &[Uuid]) -> Result<HashMap<Uuid, String>, AppError> {
        if option_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, career_traits FROM quiz_options WHERE id = ANY($1)")
                .bind(option_ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn candidate_career_paths(&self, limit: usize) -> Result<Vec<CareerPathRow>, AppError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(sqlx::query_as::<_, CareerPathRow>(
            "SELECT * FROM career_paths ORDER BY title, id LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn save_submission(
        &self,
        params: SubmissionParams<'_>,
    ) -> Result<QuizResultRow, AppError> {
        let SubmissionParams {
            user_id,
            quiz_id,
            answers,
            scores,
            recommendations,
        } = params;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query_as::<_, QuizResultRow>(
            r#"
            WITH upserted AS (
                INSERT INTO quiz_results (id, user_id, quiz_id, answers, score, completed_at)
                VALUES ($1, $2, $3, $4, $5, NOW())
                ON CONFLICT (user_id, quiz_id) DO UPDATE
                    SET answers = EXCLUDED.answers,
                        score = EXCLUDED.score,
                        completed_at = EXCLUDED.completed_at
                RETURNING *
            )
            SELECT u.id, u.user_id, u.quiz_id, q.title AS quiz_title,
                   u.answers, u.score, u.completed_at
            FROM upserted u
            JOIN career_quizzes q ON q.id = u.quiz_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(quiz_id)
        .bind(answers)
        .bind(scores.to_json())
        .fetch_one(&mut *tx)
        .await?;

        for rec in recommendations {
            sqlx::query(
                r#"
                INSERT INTO recommendations (id, user_id, career_path_id, score, reasoning)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, career_path_id) DO UPDATE
                    SET score = EXCLUDED.score,
                        reasoning = EXCLUDED.reasoning
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(rec.career_path_id)
            .bind(rec.score)
            .bind(&rec.reasoning)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "Stored quiz result {} for user {user_id} on quiz {quiz_id} ({} recommendations)",
            result.id,
            recommendations.len()
        );
        Ok(result)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory backend for tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod memory {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct Inner {
        quizzes: Vec<CareerQuizRow>,
        options: HashMap<Uuid, String>,
        careers: Vec<CareerPathRow>,
        results: HashMap<(Uuid, Uuid), QuizResultRow>,
        recommendations: HashMap<(Uuid, Uuid), DraftRecommendation>,
    }

    #[derive(Default)]
    pub struct MemoryCareerStore {
        inner: Mutex<Inner>,
    }

    impl MemoryCareerStore {
        pub fn add_quiz(&self, title: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.inner.lock().unwrap().quizzes.push(CareerQuizRow {
                id,
                title: title.to_string(),
                description: String::new(),
                created_at: Utc::now(),
            });
            id
        }

        pub fn add_option(&self, traits: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.inner
                .lock()
                .unwrap()
                .options
                .insert(id, traits.to_string());
            id
        }

        pub fn add_career(&self, title: &str, trait_profile: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.inner.lock().unwrap().careers.push(CareerPathRow {
                id,
                title: title.to_string(),
                description: String::new(),
                skills_required: String::new(),
                sector: "General".to_string(),
                average_salary: String::new(),
                job_outlook: String::new(),
                trait_profile: trait_profile.to_string(),
            });
            id
        }

        pub fn results(&self) -> Vec<QuizResultRow> {
            self.inner.lock().unwrap().results.values().cloned().collect()
        }

        pub fn recommendations_for(&self, user_id: Uuid) -> Vec<DraftRecommendation> {
            self.inner
                .lock()
                .unwrap()
                .recommendations
                .iter()
                .filter(|((u, _), _)| *u == user_id)
                .map(|(_, r)| r.clone())
                .collect()
        }
    }

    #[async_trait]
    impl CareerStore for MemoryCareerStore {
        async fn find_quiz(&self, quiz_id: Uuid) -> Result<Option<CareerQuizRow>, AppError> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.quizzes.iter().find(|q| q.id == quiz_id).cloned())
        }

        async fn option_traits(
            &self,
            option_ids: &[Uuid],
        ) -> Result<HashMap<Uuid, String>, AppError> {
            let inner = self.inner.lock().unwrap();
            Ok(option_ids
                .iter()
                .filter_map(|id| inner.options.get(id).map(|t| (*id, t.clone())))
                .collect())
        }

        async fn candidate_career_paths(
            &self,
            limit: usize,
        ) -> Result<Vec<CareerPathRow>, AppError> {
            let mut careers = self.inner.lock().unwrap().careers.clone();
            careers.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
            careers.truncate(limit);
            Ok(careers)
        }

        async fn save_submission(
            &self,
            params: SubmissionParams<'_>,
        ) -> Result<QuizResultRow, AppError> {
            let mut inner = self.inner.lock().unwrap();
            let quiz_title = inner
                .quizzes
                .iter()
                .find(|q| q.id == params.quiz_id)
                .map(|q| q.title.clone())
                .ok_or_else(|| AppError::NotFound("quiz vanished".into()))?;

            let key = (params.user_id, params.quiz_id);
            let id = inner.results.get(&key).map(|r| r.id).unwrap_or_else(Uuid::new_v4);
            let row = QuizResultRow {
                id,
                user_id: params.user_id,
                quiz_id: params.quiz_id,
                quiz_title,
                answers: params.answers.clone(),
                score: params.scores.to_json(),
                completed_at: Utc::now(),
            };
            inner.results.insert(key, row.clone());
            for rec in params.recommendations {
                inner
                    .recommendations
                    .insert((params.user_id, rec.career_path_id), rec.clone());
            }
            Ok(row)
        }
    }
}
