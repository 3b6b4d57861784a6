pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::accounts::handlers as accounts;
use crate::career::handlers as career;
use crate::jobs::handlers as jobs;
use crate::learning::handlers as learning;
use crate::lms::handlers as lms;
use crate::state::AppState;

/// Headroom on top of the resume size limit for multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_resume_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Accounts
        .route("/api/auth/register", post(accounts::handle_register))
        .route(
            "/api/auth/user",
            get(accounts::handle_get_user).patch(accounts::handle_update_user),
        )
        .route(
            "/api/auth/notifications",
            get(accounts::handle_list_notifications),
        )
        .route(
            "/api/auth/notifications/:id",
            get(accounts::handle_get_notification).delete(accounts::handle_delete_notification),
        )
        .route(
            "/api/auth/notifications/:id/read",
            post(accounts::handle_mark_notification_read),
        )
        .route(
            "/api/auth/saved-items",
            get(accounts::handle_list_saved_items).post(accounts::handle_save_item),
        )
        .route(
            "/api/auth/saved-items/:id",
            get(accounts::handle_get_saved_item).delete(accounts::handle_delete_saved_item),
        )
        // Career catalogue and quiz
        .route("/api/career/subjects", get(career::handle_list_subjects))
        .route("/api/career/subjects/:id", get(career::handle_get_subject))
        .route(
            "/api/career/universities",
            get(career::handle_list_universities),
        )
        .route(
            "/api/career/universities/:id",
            get(career::handle_get_university),
        )
        .route("/api/career/programs", get(career::handle_list_programs))
        .route("/api/career/programs/:id", get(career::handle_get_program))
        .route(
            "/api/career/career-paths",
            get(career::handle_list_career_paths),
        )
        .route(
            "/api/career/career-paths/:id",
            get(career::handle_get_career_path),
        )
        .route("/api/career/quizzes", get(career::handle_list_quizzes))
        .route("/api/career/quizzes/:id", get(career::handle_get_quiz))
        .route(
            "/api/career/quizzes/:id/submit",
            post(career::handle_submit_quiz),
        )
        .route(
            "/api/career/quiz-results",
            get(career::handle_list_quiz_results),
        )
        .route(
            "/api/career/quiz-results/:id",
            get(career::handle_get_quiz_result),
        )
        .route(
            "/api/career/recommendations",
            get(career::handle_list_recommendations),
        )
        .route(
            "/api/career/recommendations/:id",
            get(career::handle_get_recommendation),
        )
        .route(
            "/api/career/recommend/o-level",
            post(career::handle_recommend_from_o_level),
        )
        .route(
            "/api/career/recommend/a-level",
            post(career::handle_recommend_from_a_level),
        )
        .route(
            "/api/career/recommend/programs",
            post(career::handle_recommend_from_programs),
        )
        .route(
            "/api/career/recommend/careers",
            get(career::handle_recommend_careers),
        )
        // LMS
        .route(
            "/api/lms/courses",
            get(lms::handle_list_courses).post(lms::handle_create_course),
        )
        .route("/api/lms/courses/:id", get(lms::handle_get_course))
        .route("/api/lms/courses/:id/enroll", post(lms::handle_enroll))
        .route("/api/lms/courses/:id/withdraw", post(lms::handle_withdraw))
        .route(
            "/api/lms/courses/:id/modules",
            get(lms::handle_list_modules).post(lms::handle_create_module),
        )
        .route(
            "/api/lms/courses/:id/assignments",
            get(lms::handle_list_assignments).post(lms::handle_create_assignment),
        )
        .route(
            "/api/lms/courses/:id/grades",
            get(lms::handle_list_grades).post(lms::handle_record_grade),
        )
        .route(
            "/api/lms/modules/:id",
            get(lms::handle_get_module)
                .patch(lms::handle_update_module)
                .delete(lms::handle_delete_module),
        )
        .route("/api/lms/modules/:id/lessons", post(lms::handle_create_lesson))
        .route(
            "/api/lms/lessons/:id",
            get(lms::handle_get_lesson)
                .patch(lms::handle_update_lesson)
                .delete(lms::handle_delete_lesson),
        )
        .route(
            "/api/lms/assignments/:id",
            get(lms::handle_get_assignment)
                .patch(lms::handle_update_assignment)
                .delete(lms::handle_delete_assignment),
        )
        .route(
            "/api/lms/assignments/:id/submissions",
            get(lms::handle_list_submissions).post(lms::handle_submit_assignment),
        )
        .route("/api/lms/submissions/:id", get(lms::handle_get_submission))
        .route(
            "/api/lms/submissions/:id/grade",
            post(lms::handle_grade_submission),
        )
        .route(
            "/api/lms/grades/:id",
            get(lms::handle_get_grade)
                .patch(lms::handle_update_grade)
                .delete(lms::handle_delete_grade),
        )
        // Jobs board
        .route(
            "/api/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route("/api/jobs/mine", get(jobs::handle_list_my_jobs))
        .route(
            "/api/jobs/resumes",
            get(jobs::handle_list_resumes).post(jobs::handle_create_resume),
        )
        .route(
            "/api/jobs/resumes/:id",
            get(jobs::handle_get_resume).patch(jobs::handle_update_resume),
        )
        .route(
            "/api/jobs/resumes/:id/file",
            post(jobs::handle_upload_resume_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/jobs/applications",
            get(jobs::handle_list_applications),
        )
        .route(
            "/api/jobs/applications/:id",
            get(jobs::handle_get_application),
        )
        .route(
            "/api/jobs/applications/:id/status",
            patch(jobs::handle_update_application_status),
        )
        .route(
            "/api/jobs/:id",
            get(jobs::handle_get_job)
                .put(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        .route("/api/jobs/:id/apply", post(jobs::handle_apply))
        // Learning
        .route(
            "/api/learning/categories",
            get(learning::handle_list_categories),
        )
        .route(
            "/api/learning/resources",
            get(learning::handle_list_resources).post(learning::handle_create_resource),
        )
        .route(
            "/api/learning/resources/recommended",
            get(learning::handle_recommended_resources),
        )
        .route(
            "/api/learning/resources/:id",
            get(learning::handle_get_resource)
                .patch(learning::handle_update_resource)
                .delete(learning::handle_delete_resource),
        )
        .route(
            "/api/learning/tracks",
            get(learning::handle_list_tracks).post(learning::handle_create_track),
        )
        .route(
            "/api/learning/tracks/:id",
            get(learning::handle_get_track)
                .patch(learning::handle_update_track)
                .delete(learning::handle_delete_track),
        )
        .route(
            "/api/learning/tracks/:id/resources",
            post(learning::handle_add_track_resource),
        )
        .route(
            "/api/learning/track-resources/:id",
            patch(learning::handle_update_track_resource)
                .delete(learning::handle_delete_track_resource),
        )
        .route("/api/learning/progress", get(learning::handle_list_progress))
        .route(
            "/api/learning/progress/tracks",
            get(learning::handle_list_track_progress),
        )
        .route(
            "/api/learning/progress/tracks/:id",
            get(learning::handle_get_track_progress),
        )
        .route(
            "/api/learning/progress/:id",
            get(learning::handle_get_progress).patch(learning::handle_update_progress),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::{USER_ID_HEADER, USER_ROLE_HEADER};
    use crate::career::recommend::AnalyticalBaselineScorer;
    use crate::career::store::memory::MemoryCareerStore;
    use crate::config::{Config, ScorerKind};

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/nextstep_test".into(),
            s3_bucket: "nextstep".into(),
            s3_endpoint: "http://localhost:9000".into(),
            aws_access_key_id: "test".into(),
            aws_secret_access_key: "test".into(),
            port: 0,
            rust_log: "debug".into(),
            recommendation_candidate_limit: 5,
            recommendation_scorer: ScorerKind::AnalyticalBaseline,
            max_resume_upload_bytes: 1024,
        }
    }

    /// Router over an in-memory career store. The pool never connects, so
    /// only requests that stop before touching SQL may be sent.
    fn test_app(store: Arc<MemoryCareerStore>) -> Router {
        let config = test_config();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .build();

        build_router(AppState {
            db,
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            config,
            career_store: store,
            match_scorer: Arc::new(AnalyticalBaselineScorer),
        })
    }

    fn request(method: &str, uri: &str, who: Option<(Uuid, &str)>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some((id, role)) = who {
            builder = builder
                .header(USER_ID_HEADER, id.to_string())
                .header(USER_ROLE_HEADER, role);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(Arc::default());
        let response = app
            .oneshot(request("GET", "/health", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], "nextstep-api");
    }

    #[tokio::test]
    async fn test_submit_quiz_returns_created_result() {
        let store = Arc::new(MemoryCareerStore::default());
        let quiz = store.add_quiz("Career Compass");
        let opt_a = store.add_option("analytical,leadership");
        let opt_b = store.add_option("analytical");
        store.add_career("Data Scientist", "");
        let user = Uuid::new_v4();

        let body = json!({"answers": {"q1": opt_a.to_string(), "q2": opt_b.to_string()}});
        let response = test_app(store.clone())
            .oneshot(request(
                "POST",
                &format!("/api/career/quizzes/{quiz}/submit"),
                Some((user, "O_LEVEL")),
                &body.to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let result = body_json(response).await;
        assert_eq!(result["user_id"], json!(user.to_string()));
        assert_eq!(result["quiz_title"], "Career Compass");
        assert_eq!(
            result["score"],
            json!({"analytical": 2, "creative": 0, "social": 0, "practical": 0, "leadership": 1})
        );
        assert_eq!(store.recommendations_for(user)[0].score, 60.0);
    }

    #[tokio::test]
    async fn test_submit_to_missing_quiz_is_404() {
        let store = Arc::new(MemoryCareerStore::default());
        let response = test_app(store.clone())
            .oneshot(request(
                "POST",
                &format!("/api/career/quizzes/{}/submit", Uuid::new_v4()),
                Some((Uuid::new_v4(), "GENERAL")),
                r#"{"answers": {}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(store.results().is_empty());
    }

    #[tokio::test]
    async fn test_submit_requires_identity() {
        let response = test_app(Arc::default())
            .oneshot(request(
                "POST",
                &format!("/api/career/quizzes/{}/submit", Uuid::new_v4()),
                None,
                r#"{"answers": {}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_submit_with_bad_answers_reports_field() {
        let store = Arc::new(MemoryCareerStore::default());
        let quiz = store.add_quiz("Q");
        let response = test_app(store)
            .oneshot(request(
                "POST",
                &format!("/api/career/quizzes/{quiz}/submit"),
                Some((Uuid::new_v4(), "TERTIARY")),
                r#"{"answers": ["not", "a", "map"]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]["details"]["answers"].is_array());
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let store = Arc::new(MemoryCareerStore::default());
        let quiz = store.add_quiz("Q");
        let response = test_app(store)
            .oneshot(request(
                "POST",
                &format!("/api/career/quizzes/{quiz}/submit"),
                Some((Uuid::new_v4(), "TERTIARY")),
                "{not json",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_missing_quiz_is_404_even_with_bad_answers() {
        let store = Arc::new(MemoryCareerStore::default());
        for body in [r#"{"answers": [1]}"#, "{not json"] {
            let response = test_app(store.clone())
                .oneshot(request(
                    "POST",
                    &format!("/api/career/quizzes/{}/submit", Uuid::new_v4()),
                    Some((Uuid::new_v4(), "TERTIARY")),
                    body,
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{body}");
            assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
        }
        assert!(store.results().is_empty());
    }

    #[tokio::test]
    async fn test_non_uuid_quiz_id_is_404_envelope() {
        let response = test_app(Arc::default())
            .oneshot(request(
                "POST",
                "/api/career/quizzes/not-a-uuid/submit",
                Some((Uuid::new_v4(), "TERTIARY")),
                r#"{"answers": {}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(
            body["error"]["message"],
            "No resource at /api/career/quizzes/not-a-uuid/submit"
        );
    }

    #[tokio::test]
    async fn test_students_cannot_create_courses() {
        let body = json!({
            "title": "Intro to Rust",
            "code": "RS101",
            "start_date": "2025-09-01",
            "end_date": "2025-12-15"
        });
        let response = test_app(Arc::default())
            .oneshot(request(
                "POST",
                "/api/lms/courses",
                Some((Uuid::new_v4(), "A_LEVEL")),
                &body.to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_study_recommendations_are_student_only() {
        let response = test_app(Arc::default())
            .oneshot(request(
                "POST",
                "/api/career/recommend/o-level",
                Some((Uuid::new_v4(), "EMPLOYER")),
                r#"{"subjects": []}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_empty_subject_selection_is_400() {
        let response = test_app(Arc::default())
            .oneshot(request(
                "POST",
                "/api/career/recommend/a-level",
                Some((Uuid::new_v4(), "A_LEVEL")),
                r#"{"subjects": []}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_students_cannot_review_applications() {
        let response = test_app(Arc::default())
            .oneshot(request(
                "PATCH",
                &format!("/api/jobs/applications/{}/status", Uuid::new_v4()),
                Some((Uuid::new_v4(), "TERTIARY")),
                r#"{"status": "HIRED"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_students_cannot_publish_tracks_or_edit_resources() {
        let student = Some((Uuid::new_v4(), "TERTIARY"));
        let track = json!({"title": "Backend path", "difficulty_level": "BEGINNER"});
        let cases = [
            ("POST", "/api/learning/tracks".to_string(), track.to_string()),
            (
                "PATCH",
                format!("/api/learning/resources/{}", Uuid::new_v4()),
                r#"{"title": "x"}"#.to_string(),
            ),
            (
                "DELETE",
                format!("/api/learning/tracks/{}", Uuid::new_v4()),
                String::new(),
            ),
            (
                "POST",
                format!("/api/learning/tracks/{}/resources", Uuid::new_v4()),
                json!({"resource_id": Uuid::new_v4(), "position": 0}).to_string(),
            ),
        ];
        for (method, uri, body) in cases {
            let response = test_app(Arc::default())
                .oneshot(request(method, &uri, student, &body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_only_lecturers_edit_course_content() {
        let mentor = Some((Uuid::new_v4(), "MENTOR"));
        let cases = [
            ("PATCH", format!("/api/lms/modules/{}", Uuid::new_v4()), r#"{"title": "x"}"#),
            (
                "POST",
                format!("/api/lms/modules/{}/lessons", Uuid::new_v4()),
                r#"{"title": "x", "position": 0, "duration_minutes": 5}"#,
            ),
            ("DELETE", format!("/api/lms/lessons/{}", Uuid::new_v4()), ""),
            ("PATCH", format!("/api/lms/assignments/{}", Uuid::new_v4()), "{}"),
            ("PATCH", format!("/api/lms/grades/{}", Uuid::new_v4()), "{}"),
        ];
        for (method, uri, body) in cases {
            let response = test_app(Arc::default())
                .oneshot(request(method, &uri, mentor, body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_non_uuid_content_ids_are_404_envelopes() {
        for uri in [
            "/api/lms/lessons/intro",
            "/api/lms/modules/1",
            "/api/lms/grades/latest",
            "/api/learning/tracks/rust",
            "/api/learning/progress/tracks/rust",
        ] {
            let response = test_app(Arc::default())
                .oneshot(request("GET", uri, Some((Uuid::new_v4(), "LECTURER")), ""))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
        }
    }

    #[tokio::test]
    async fn test_lesson_body_is_validated_before_lookup() {
        let response = test_app(Arc::default())
            .oneshot(request(
                "POST",
                &format!("/api/lms/modules/{}/lessons", Uuid::new_v4()),
                Some((Uuid::new_v4(), "LECTURER")),
                r#"{"title": "Ownership"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }
}
