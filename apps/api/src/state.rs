use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::career::recommend::MatchScorer;
use crate::career::store::CareerStore;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    pub config: Config,
    /// Persistence for quiz submissions. Default: PgCareerStore over `db`.
    pub career_store: Arc<dyn CareerStore>,
    /// Pluggable career match scorer, chosen by RECOMMENDATION_SCORER.
    pub match_scorer: Arc<dyn MatchScorer>,
}
