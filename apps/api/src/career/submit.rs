//! Quiz submission — orchestrates the career recommendation pipeline.
//!
//! Flow: find_quiz → body validation → option lookup → aggregate_traits →
//!       candidate career paths → build_recommendations → save_submission
//!       (one transaction).

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::career::recommend::{build_recommendations, dominant_traits, MatchScorer};
use crate::career::store::{CareerStore, SubmissionParams};
use crate::career::traits::{aggregate_traits, referenced_option_ids};
use crate::errors::{AppError, FieldErrors};
use crate::models::career::QuizResultRow;

/// Validated request body: `{"answers": {"<question id>": "<option id>"}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizSubmission {
    pub answers: Map<String, Value>,
}

impl QuizSubmission {
    /// Validates a raw JSON body. Only the outer shape is checked here; bad
    /// individual answers are dropped later during aggregation.
    pub fn from_body(body: Value) -> Result<Self, AppError> {
        let mut errors = FieldErrors::new();

        let Value::Object(mut obj) = body else {
            errors.add("non_field_errors", "Expected a JSON object");
            return Err(AppError::InvalidFields(errors));
        };

        match obj.remove("answers") {
            Some(Value::Object(answers)) => Ok(QuizSubmission { answers }),
            Some(_) => {
                errors.add(
                    "answers",
                    "Expected an object mapping question ids to option ids",
                );
                Err(AppError::InvalidFields(errors))
            }
            None => {
                errors.add("answers", "This field is required");
                Err(AppError::InvalidFields(errors))
            }
        }
    }
}

/// Runs one submission for (user, quiz) and returns the stored result.
///
/// `body` is the parsed request body, or the error parsing it produced. A
/// missing quiz fails with `NotFound` before the body is looked at and before
/// anything is written.
pub async fn submit_quiz(
    store: &dyn CareerStore,
    scorer: &dyn MatchScorer,
    candidate_limit: usize,
    user_id: Uuid,
    quiz_id: Uuid,
    body: Result<Value, AppError>,
) -> Result<QuizResultRow, AppError> {
    store
        .find_quiz(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {quiz_id} not found")))?;
    let submission = QuizSubmission::from_body(body?)?;

    let option_ids = referenced_option_ids(&submission.answers);
    let option_traits = store.option_traits(&option_ids).await?;
    debug!(
        "Resolved {}/{} referenced options for quiz {quiz_id}",
        option_traits.len(),
        option_ids.len()
    );

    let scores = aggregate_traits(&submission.answers, &option_traits);
    let dominant = dominant_traits(&scores);
    info!("Quiz {quiz_id} by user {user_id}: dominant traits {dominant:?}");

    let candidates = store.candidate_career_paths(candidate_limit).await?;
    let recommendations = build_recommendations(&scores, &candidates, scorer);

    let answers = Value::Object(submission.answers);
    store
        .save_submission(SubmissionParams {
            user_id,
            quiz_id,
            answers: &answers,
            scores: &scores,
            recommendations: &recommendations,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::recommend::{AnalyticalBaselineScorer, TraitProfileScorer};
    use crate::career::store::memory::MemoryCareerStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn submission(answers: Value) -> Result<Value, AppError> {
        Ok(json!({ "answers": answers }))
    }

    #[tokio::test]
    async fn test_worked_example_end_to_end() {
        let store = MemoryCareerStore::default();
        let quiz = store.add_quiz("Career Compass");
        let opt_a = store.add_option("analytical,leadership");
        let opt_b = store.add_option("analytical");
        store.add_career("Data Scientist", "");
        let user = Uuid::new_v4();

        let result = submit_quiz(
            &store,
            &AnalyticalBaselineScorer,
            5,
            user,
            quiz,
            submission(json!({"q1": opt_a.to_string(), "q2": opt_b.to_string()})),
        )
        .await
        .unwrap();

        assert_eq!(result.quiz_title, "Career Compass");
        assert_eq!(
            result.score,
            json!({"analytical": 2, "creative": 0, "social": 0, "practical": 0, "leadership": 1})
        );
        let recs = store.recommendations_for(user);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].score, 60.0);
    }

    #[tokio::test]
    async fn test_missing_quiz_is_not_found_and_writes_nothing() {
        let store = MemoryCareerStore::default();
        let opt = store.add_option("social");
        store.add_career("Teacher", "social");

        let err = submit_quiz(
            &store,
            &AnalyticalBaselineScorer,
            5,
            Uuid::new_v4(),
            Uuid::new_v4(),
            submission(json!({"q1": opt.to_string()})),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.results().is_empty());
    }

    #[tokio::test]
    async fn test_missing_quiz_wins_over_malformed_body() {
        let store = MemoryCareerStore::default();

        for body in [
            Ok(json!({"answers": [1]})),
            Err(AppError::Validation("EOF while parsing".into())),
        ] {
            let err = submit_quiz(
                &store,
                &AnalyticalBaselineScorer,
                5,
                Uuid::new_v4(),
                Uuid::new_v4(),
                body,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "{err:?}");
        }
        assert!(store.results().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_for_existing_quiz_is_rejected() {
        let store = MemoryCareerStore::default();
        let quiz = store.add_quiz("Q");

        let err = submit_quiz(
            &store,
            &AnalyticalBaselineScorer,
            5,
            Uuid::new_v4(),
            quiz,
            Ok(json!({"answers": [1]})),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidFields(_)));
        assert!(store.results().is_empty());
    }

    #[tokio::test]
    async fn test_resubmission_replaces_previous_result() {
        let store = MemoryCareerStore::default();
        let quiz = store.add_quiz("Q");
        let creative = store.add_option("creative");
        let social = store.add_option("social");
        store.add_career("Designer", "creative");
        let user = Uuid::new_v4();

        let first = submit_quiz(
            &store,
            &AnalyticalBaselineScorer,
            5,
            user,
            quiz,
            submission(json!({"q1": creative.to_string()})),
        )
        .await
        .unwrap();
        let second = submit_quiz(
            &store,
            &AnalyticalBaselineScorer,
            5,
            user,
            quiz,
            submission(json!({"q1": social.to_string()})),
        )
        .await
        .unwrap();

        let stored = store.results();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, first.id);
        assert_eq!(stored[0].answers, second.answers);
        assert_eq!(stored[0].score["creative"], json!(0));
        assert_eq!(stored[0].score["social"], json!(1));
        assert_eq!(store.recommendations_for(user).len(), 1);
    }

    #[tokio::test]
    async fn test_candidate_limit_bounds_recommendations() {
        let store = MemoryCareerStore::default();
        let quiz = store.add_quiz("Q");
        for title in ["E", "D", "C", "B", "A"] {
            store.add_career(title, "");
        }
        let user = Uuid::new_v4();

        submit_quiz(
            &store,
            &AnalyticalBaselineScorer,
            2,
            user,
            quiz,
            submission(json!({})),
        )
        .await
        .unwrap();

        assert_eq!(store.recommendations_for(user).len(), 2);
    }

    #[tokio::test]
    async fn test_profile_scorer_differentiates_careers() {
        let store = MemoryCareerStore::default();
        let quiz = store.add_quiz("Q");
        let opt = store.add_option("creative");
        let artist = store.add_career("Artist", "creative");
        let auditor = store.add_career("Auditor", "analytical");
        let user = Uuid::new_v4();

        submit_quiz(
            &store,
            &TraitProfileScorer,
            5,
            user,
            quiz,
            submission(json!({"q1": opt.to_string()})),
        )
        .await
        .unwrap();

        let recs = store.recommendations_for(user);
        let score_of = |id: Uuid| {
            recs.iter()
                .find(|r| r.career_path_id == id)
                .unwrap()
                .score
        };
        assert_eq!(score_of(artist), 100.0);
        assert_eq!(score_of(auditor), 0.0);
    }

    #[test]
    fn test_body_must_be_object() {
        let err = QuizSubmission::from_body(json!(["q1", "opt"])).unwrap_err();
        let AppError::InvalidFields(fields) = err else {
            panic!("expected field errors");
        };
        assert!(fields.get("non_field_errors").is_some());
    }

    #[test]
    fn test_answers_must_be_object() {
        for body in [json!({"answers": "q1=opt"}), json!({"answers": [1, 2]}), json!({})] {
            let err = QuizSubmission::from_body(body).unwrap_err();
            let AppError::InvalidFields(fields) = err else {
                panic!("expected field errors");
            };
            assert!(fields.get("answers").is_some());
        }
    }
}
