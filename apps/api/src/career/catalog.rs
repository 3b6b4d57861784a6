//! Read-side views over the career catalogue: quiz detail assembly and the
//! subject → program → career study-path lookups.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::career::{
    CareerPathRow, CareerQuizRow, ProgramRow, QuizOptionRow, QuizQuestionRow, SubjectRow,
};

/// Upper bound on rows returned by the study-path lookups.
pub const STUDY_RECOMMENDATION_LIMIT: i64 = 10;

pub const PROGRAM_SELECT: &str = r#"
    SELECT p.id, p.name, p.university_id, u.name AS university_name,
           p.degree_type, p.description, p.duration_years, p.entry_requirements
    FROM programs p
    JOIN universities u ON u.id = p.university_id
"#;

#[derive(Debug, Clone, Serialize)]
pub struct QuizQuestionView {
    #[serde(flatten)]
    pub question: QuizQuestionRow,
    pub options: Vec<QuizOptionRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: CareerQuizRow,
    pub questions: Vec<QuizQuestionView>,
}

/// Attaches each option to its question, keeping question order as given.
/// Options whose question is not in `questions` are dropped.
pub fn group_options(
    questions: Vec<QuizQuestionRow>,
    options: Vec<QuizOptionRow>,
) -> Vec<QuizQuestionView> {
    let mut views: Vec<QuizQuestionView> = questions
        .into_iter()
        .map(|question| QuizQuestionView {
            question,
            options: Vec::new(),
        })
        .collect();

    for option in options {
        if let Some(view) = views
            .iter_mut()
            .find(|v| v.question.id == option.question_id)
        {
            view.options.push(option);
        }
    }
    views
}

pub async fn load_quiz_detail(pool: &PgPool, quiz_id: Uuid) -> Result<QuizDetail, AppError> {
    let quiz = sqlx::query_as::<_, CareerQuizRow>("SELECT * FROM career_quizzes WHERE id = $1")
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {quiz_id} not found")))?;

    let questions = sqlx::query_as::<_, QuizQuestionRow>(
        "SELECT * FROM quiz_questions WHERE quiz_id = $1 ORDER BY position, id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let options = sqlx::query_as::<_, QuizOptionRow>(
        r#"
        SELECT o.id, o.question_id, o.text
        FROM quiz_options o
        JOIN quiz_questions q ON q.id = o.question_id
        WHERE q.quiz_id = $1
        ORDER BY o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok(QuizDetail {
        quiz,
        questions: group_options(questions, options),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Study-path lookups
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubjectSelection {
    #[serde(default)]
    pub subjects: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ProgramSelection {
    #[serde(default)]
    pub programs: Vec<Uuid>,
}

pub fn require_selection(ids: &[Uuid], what: &str) -> Result<(), AppError> {
    if ids.is_empty() {
        return Err(AppError::Validation(format!("Please provide {what} IDs")));
    }
    Ok(())
}

/// A-level subjects suggested after O-level choices. The O-level selection
/// must contain at least one real O-level subject.
pub async fn a_level_subjects_for(
    pool: &PgPool,
    o_level_ids: &[Uuid],
) -> Result<Vec<SubjectRow>, AppError> {
    let valid: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM subjects WHERE id = ANY($1) AND level = 'O_LEVEL'",
    )
    .bind(o_level_ids)
    .fetch_one(pool)
    .await?;
    if valid == 0 {
        return Err(AppError::Validation(
            "No valid O Level subjects found".to_string(),
        ));
    }

    Ok(sqlx::query_as::<_, SubjectRow>(
        "SELECT * FROM subjects WHERE level = 'A_LEVEL' ORDER BY name LIMIT $1",
    )
    .bind(STUDY_RECOMMENDATION_LIMIT)
    .fetch_all(pool)
    .await?)
}

/// Programs that require any of the given A-level subjects.
pub async fn programs_for_subjects(
    pool: &PgPool,
    a_level_ids: &[Uuid],
) -> Result<Vec<ProgramRow>, AppError> {
    let valid: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM subjects WHERE id = ANY($1) AND level = 'A_LEVEL'")
            .bind(a_level_ids)
            .fetch_all(pool)
            .await?;
    if valid.is_empty() {
        return Err(AppError::Validation(
            "No valid A Level subjects found".to_string(),
        ));
    }

    let sql = format!(
        r#"{PROGRAM_SELECT}
        WHERE EXISTS (
            SELECT 1 FROM program_subjects ps
            WHERE ps.program_id = p.id AND ps.subject_id = ANY($1)
        )
        ORDER BY p.name
        LIMIT $2"#
    );
    Ok(sqlx::query_as::<_, ProgramRow>(&sql)
        .bind(&valid)
        .bind(STUDY_RECOMMENDATION_LIMIT)
        .fetch_all(pool)
        .await?)
}

/// Career paths linked to any of the given programs.
pub async fn careers_for_programs(
    pool: &PgPool,
    program_ids: &[Uuid],
) -> Result<Vec<CareerPathRow>, AppError> {
    let valid: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM programs WHERE id = ANY($1)")
        .bind(program_ids)
        .fetch_all(pool)
        .await?;
    if valid.is_empty() {
        return Err(AppError::Validation("No valid programs found".to_string()));
    }

    Ok(sqlx::query_as::<_, CareerPathRow>(
        r#"
        SELECT c.* FROM career_paths c
        WHERE EXISTS (
            SELECT 1 FROM career_path_programs cp
            WHERE cp.career_path_id = c.id AND cp.program_id = ANY($1)
        )
        ORDER BY c.title
        LIMIT $2
        "#,
    )
    .bind(&valid)
    .bind(STUDY_RECOMMENDATION_LIMIT)
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(position: i32) -> QuizQuestionRow {
        QuizQuestionRow {
            id: Uuid::new_v4(),
            quiz_id: Uuid::nil(),
            text: format!("Question {position}"),
            position,
        }
    }

    fn option(question_id: Uuid, text: &str) -> QuizOptionRow {
        QuizOptionRow {
            id: Uuid::new_v4(),
            question_id,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_group_options_attaches_to_questions() {
        let q1 = question(1);
        let q2 = question(2);
        let options = vec![
            option(q2.id, "b1"),
            option(q1.id, "a1"),
            option(q1.id, "a2"),
            option(Uuid::new_v4(), "orphan"),
        ];
        let views = group_options(vec![q1.clone(), q2.clone()], options);

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].question.id, q1.id);
        let texts: Vec<_> = views[0].options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["a1", "a2"]);
        assert_eq!(views[1].options.len(), 1);
    }

    #[test]
    fn test_question_view_flattens_and_hides_traits() {
        let q = question(1);
        let view = QuizQuestionView {
            options: vec![option(q.id, "Solve puzzles")],
            question: q,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["position"], 1);
        assert!(json["options"][0].get("career_traits").is_none());
    }

    #[test]
    fn test_require_selection_rejects_empty() {
        assert!(matches!(
            require_selection(&[], "subject"),
            Err(AppError::Validation(_))
        ));
        assert!(require_selection(&[Uuid::new_v4()], "subject").is_ok());
    }
}
