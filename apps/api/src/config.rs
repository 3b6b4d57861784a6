use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which `MatchScorer` backend the career recommender uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerKind {
    AnalyticalBaseline,
    TraitProfile,
}

impl FromStr for ScorerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analytical_baseline" | "baseline" => Ok(ScorerKind::AnalyticalBaseline),
            "trait_profile" | "profile" => Ok(ScorerKind::TraitProfile),
            other => bail!("unknown RECOMMENDATION_SCORER '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub port: u16,
    pub rust_log: String,
    /// How many career paths a quiz submission scores against.
    pub recommendation_candidate_limit: usize,
    pub recommendation_scorer: ScorerKind,
    pub max_resume_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
            recommendation_candidate_limit: parse_candidate_limit(&optional_env(
                "RECOMMENDATION_CANDIDATE_LIMIT",
                "5",
            ))?,
            recommendation_scorer: optional_env("RECOMMENDATION_SCORER", "analytical_baseline")
                .parse()?,
            max_resume_upload_bytes: optional_env("MAX_RESUME_UPLOAD_BYTES", "5242880")
                .parse::<usize>()
                .context("MAX_RESUME_UPLOAD_BYTES must be a byte count")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_candidate_limit(raw: &str) -> Result<usize> {
    let limit = raw
        .trim()
        .parse::<usize>()
        .context("RECOMMENDATION_CANDIDATE_LIMIT must be a positive integer")?;
    if limit == 0 {
        bail!("RECOMMENDATION_CANDIDATE_LIMIT must be at least 1");
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scorer_kind_parses_aliases() {
        assert_eq!(
            "analytical_baseline".parse::<ScorerKind>().unwrap(),
            ScorerKind::AnalyticalBaseline
        );
        assert_eq!(
            " Trait_Profile ".parse::<ScorerKind>().unwrap(),
            ScorerKind::TraitProfile
        );
        assert!("cosine".parse::<ScorerKind>().is_err());
    }

    #[test]
    fn test_candidate_limit_rejects_zero() {
        assert!(parse_candidate_limit("0").is_err());
        assert!(parse_candidate_limit("-3").is_err());
        assert_eq!(parse_candidate_limit(" 7 ").unwrap(), 7);
    }
}
