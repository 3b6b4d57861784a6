//! Recommendation Generator — pluggable, trait-based career match scoring.
//!
//! Default: `AnalyticalBaselineScorer` (`min(100, 50 + 5 × analytical)`).
//! Alternative: `TraitProfileScorer` (cosine similarity against each career
//! path's `trait_profile` tags).
//!
//! `AppState` holds an `Arc<dyn MatchScorer>`, chosen at startup via config.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::career::traits::{parse_trait_tags, Trait, TraitScores};
use crate::config::ScorerKind;
use crate::models::career::CareerPathRow;

/// How many top-ranked traits are reported as dominant.
pub const DOMINANT_TRAIT_COUNT: usize = 2;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Scores how well a trait profile matches one career path.
/// Implementations may return anything; callers clamp to [0, 100].
pub trait MatchScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, traits: &TraitScores, career: &CareerPathRow) -> f64;
}

pub fn scorer_for(kind: ScorerKind) -> Arc<dyn MatchScorer> {
    match kind {
        ScorerKind::AnalyticalBaseline => Arc::new(AnalyticalBaselineScorer),
        ScorerKind::TraitProfile => Arc::new(TraitProfileScorer),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scorer backends
// ────────────────────────────────────────────────────────────────────────────

/// Placeholder formula: only the analytical count moves the score, and every
/// career path receives the same value.
pub struct AnalyticalBaselineScorer;

impl MatchScorer for AnalyticalBaselineScorer {
    fn name(&self) -> &'static str {
        "analytical_baseline"
    }

    fn score(&self, traits: &TraitScores, _career: &CareerPathRow) -> f64 {
        50.0 + f64::from(traits.get(Trait::Analytical)) * 5.0
    }
}

/// Cosine similarity between the user's trait counts and the career path's
/// tag vector, scaled to 0–100. Neutral 50 when either side has no signal.
pub struct TraitProfileScorer;

impl MatchScorer for TraitProfileScorer {
    fn name(&self) -> &'static str {
        "trait_profile"
    }

    fn score(&self, traits: &TraitScores, career: &CareerPathRow) -> f64 {
        let mut profile = TraitScores::default();
        for t in parse_trait_tags(&career.trait_profile) {
            profile.increment(t);
        }

        let dot: f64 = Trait::ALL
            .iter()
            .map(|t| f64::from(traits.get(*t)) * f64::from(profile.get(*t)))
            .sum();
        let norm = |s: &TraitScores| {
            s.iter()
                .map(|(_, c)| f64::from(c).powi(2))
                .sum::<f64>()
                .sqrt()
        };
        let denom = norm(traits) * norm(&profile);
        if denom == 0.0 {
            return 50.0;
        }
        dot / denom * 100.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generation
// ────────────────────────────────────────────────────────────────────────────

/// A recommendation ready to be upserted for (user, career_path).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftRecommendation {
    pub career_path_id: Uuid,
    pub score: f64,
    pub reasoning: String,
}

pub fn dominant_traits(scores: &TraitScores) -> Vec<Trait> {
    scores
        .ranked()
        .into_iter()
        .take(DOMINANT_TRAIT_COUNT)
        .map(|(t, _)| t)
        .collect()
}

pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return MIN_SCORE;
    }
    raw.clamp(MIN_SCORE, MAX_SCORE)
}

/// One recommendation per candidate career path, in candidate order.
pub fn build_recommendations(
    scores: &TraitScores,
    candidates: &[CareerPathRow],
    scorer: &dyn MatchScorer,
) -> Vec<DraftRecommendation> {
    let dominant = dominant_traits(scores);

    candidates
        .iter()
        .map(|career| DraftRecommendation {
            career_path_id: career.id,
            score: clamp_score(scorer.score(scores, career)),
            reasoning: build_reasoning(&dominant, &career.title),
        })
        .collect()
}

fn build_reasoning(dominant: &[Trait], career_title: &str) -> String {
    let names: Vec<&str> = dominant.iter().map(|t| t.as_str()).collect();
    format!(
        "Based on your quiz results, you have strong {} traits which align well with {}.",
        names.join(", "),
        career_title
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn career(title: &str, profile: &str) -> CareerPathRow {
        CareerPathRow {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            skills_required: String::new(),
            sector: "Technology".to_string(),
            average_salary: String::new(),
            job_outlook: String::new(),
            trait_profile: profile.to_string(),
        }
    }

    fn scores(counts: &[(Trait, u32)]) -> TraitScores {
        let mut s = TraitScores::default();
        for (t, n) in counts {
            for _ in 0..*n {
                s.increment(*t);
            }
        }
        s
    }

    #[test]
    fn test_baseline_worked_example_scores_60() {
        let s = scores(&[(Trait::Analytical, 2), (Trait::Leadership, 1)]);
        let recs = build_recommendations(
            &s,
            &[career("Data Scientist", "")],
            &AnalyticalBaselineScorer,
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].score, 60.0);
        assert_eq!(
            recs[0].reasoning,
            concat!(
                "Based on your quiz results, you have strong analytical, leadership traits ",
                "which align well with Data Scientist."
            )
        );
    }

    #[test]
    fn test_baseline_caps_at_100() {
        let s = scores(&[(Trait::Analytical, 40)]);
        let recs = build_recommendations(&s, &[career("Actuary", "")], &AnalyticalBaselineScorer);
        assert_eq!(recs[0].score, 100.0);
    }

    #[test]
    fn test_baseline_ignores_other_traits() {
        let s = scores(&[(Trait::Creative, 9), (Trait::Social, 4)]);
        assert_eq!(AnalyticalBaselineScorer.score(&s, &career("Designer", "")), 50.0);
    }

    #[test]
    fn test_one_recommendation_per_candidate() {
        let candidates: Vec<_> = (0..3).map(|i| career(&format!("Career {i}"), "")).collect();
        let recs = build_recommendations(
            &TraitScores::default(),
            &candidates,
            &AnalyticalBaselineScorer,
        );
        let ids: Vec<_> = recs.iter().map(|r| r.career_path_id).collect();
        let expected: Vec<_> = candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_dominant_traits_all_zero_uses_vocabulary_order() {
        assert_eq!(
            dominant_traits(&TraitScores::default()),
            vec![Trait::Analytical, Trait::Creative]
        );
    }

    #[test]
    fn test_profile_scorer_exact_match_is_100() {
        let s = scores(&[(Trait::Social, 2), (Trait::Leadership, 2)]);
        let score = TraitProfileScorer.score(&s, &career("Manager", "social, leadership"));
        assert!((score - 100.0).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_profile_scorer_orthogonal_is_0() {
        let s = scores(&[(Trait::Creative, 3)]);
        let score = TraitProfileScorer.score(&s, &career("Accountant", "analytical,practical"));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_profile_scorer_neutral_without_signal() {
        assert_eq!(
            TraitProfileScorer.score(&TraitScores::default(), &career("Nurse", "social")),
            50.0
        );
        let s = scores(&[(Trait::Social, 1)]);
        assert_eq!(TraitProfileScorer.score(&s, &career("Unprofiled", "")), 50.0);
    }

    #[test]
    fn test_clamp_score_bounds() {
        assert_eq!(clamp_score(-12.0), 0.0);
        assert_eq!(clamp_score(250.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn test_scores_always_in_range_for_both_scorers() {
        let candidates = vec![career("A", "analytical"), career("B", "creative,social")];
        for n in [0, 1, 10, 1_000] {
            let s = scores(&[(Trait::Analytical, n), (Trait::Social, n / 2)]);
            let scorers = [
                scorer_for(ScorerKind::AnalyticalBaseline),
                scorer_for(ScorerKind::TraitProfile),
            ];
            for scorer in scorers {
                for rec in build_recommendations(&s, &candidates, scorer.as_ref()) {
                    assert!((MIN_SCORE..=MAX_SCORE).contains(&rec.score), "{}", rec.score);
                }
            }
        }
    }
}
