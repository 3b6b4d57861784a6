//! Pure grading rules: submission status, point bounds and letter grades.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::errors::{AppError, FieldErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Submitted,
    Late,
    Graded,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Late => "late",
            SubmissionStatus::Graded => "graded",
        }
    }
}

/// `late` strictly after the due date, `submitted` otherwise.
pub fn submission_status(submitted_at: DateTime<Utc>, due: DateTime<Utc>) -> SubmissionStatus {
    if submitted_at > due {
        SubmissionStatus::Late
    } else {
        SubmissionStatus::Submitted
    }
}

pub fn validate_awarded_points(points: f64, total_points: i32) -> Result<(), AppError> {
    if !points.is_finite() || points < 0.0 || points > f64::from(total_points) {
        return Err(AppError::Validation(format!(
            "Points must be between 0 and {total_points}"
        )));
    }
    Ok(())
}

/// A ≥ 90 %, B ≥ 80 %, C ≥ 70 %, D ≥ 60 %, F below.
pub fn grade_letter(points_earned: f64, points_possible: f64) -> &'static str {
    let pct = points_earned * 100.0 / points_possible;
    match pct {
        p if p >= 90.0 => "A",
        p if p >= 80.0 => "B",
        p if p >= 70.0 => "C",
        p if p >= 60.0 => "D",
        _ => "F",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewCourse {
    pub title: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub semester: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl NewCourse {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.title.trim().is_empty() {
            errors.add("title", "This field may not be blank");
        }
        if self.code.trim().is_empty() {
            errors.add("code", "This field may not be blank");
        }
        if self.end_date < self.start_date {
            errors.add("end_date", "End date must not be before start date");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub total_points: i32,
}

impl NewAssignment {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.title.trim().is_empty() {
            errors.add("title", "This field may not be blank");
        }
        if self.total_points <= 0 {
            errors.add("total_points", "Total points must be greater than zero");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseGradeEntry {
    pub student_id: uuid::Uuid,
    pub points_earned: f64,
    pub points_possible: f64,
    pub comments: Option<String>,
}

impl CourseGradeEntry {
    /// Validates the entry and returns its letter grade.
    pub fn letter(&self) -> Result<&'static str, AppError> {
        checked_grade_letter(self.points_earned, self.points_possible)
    }
}

/// Partial edit of a recorded course grade. The letter is always re-derived.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradeUpdate {
    pub points_earned: Option<f64>,
    pub points_possible: Option<f64>,
    pub comments: Option<String>,
}

impl GradeUpdate {
    /// Merges onto the stored points and returns `(earned, possible, letter)`.
    pub fn resolve(
        &self,
        earned: f64,
        possible: f64,
    ) -> Result<(f64, f64, &'static str), AppError> {
        let earned = self.points_earned.unwrap_or(earned);
        let possible = self.points_possible.unwrap_or(possible);
        let letter = checked_grade_letter(earned, possible)?;
        Ok((earned, possible, letter))
    }
}

fn checked_grade_letter(earned: f64, possible: f64) -> Result<&'static str, AppError> {
    let mut errors = FieldErrors::new();
    if !(possible.is_finite() && possible > 0.0) {
        errors.add("points_possible", "Must be greater than zero");
    }
    if !(earned.is_finite() && earned >= 0.0) {
        errors.add("points_earned", "Must not be negative");
    } else if earned > possible {
        errors.add("points_earned", "Cannot exceed points possible");
    }
    errors.into_result()?;
    Ok(grade_letter(earned, possible))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn test_grade_letter_boundaries() {
        let cases = [
            (100.0, "A"),
            (90.0, "A"),
            (89.99, "B"),
            (80.0, "B"),
            (70.0, "C"),
            (60.0, "D"),
            (59.9, "F"),
            (0.0, "F"),
        ];
        for (earned, letter) in cases {
            assert_eq!(grade_letter(earned, 100.0), letter, "{earned}");
        }
        assert_eq!(grade_letter(45.0, 50.0), "A");
    }

    #[test]
    fn test_submission_after_due_date_is_late() {
        let due = Utc::now();
        assert_eq!(submission_status(due, due), SubmissionStatus::Submitted);
        assert_eq!(
            submission_status(due - Duration::hours(1), due),
            SubmissionStatus::Submitted
        );
        assert_eq!(
            submission_status(due + Duration::seconds(1), due),
            SubmissionStatus::Late
        );
    }

    #[test]
    fn test_awarded_points_bounds() {
        assert!(validate_awarded_points(0.0, 10).is_ok());
        assert!(validate_awarded_points(10.0, 10).is_ok());
        assert!(validate_awarded_points(10.5, 10).is_err());
        assert!(validate_awarded_points(-1.0, 10).is_err());
        assert!(validate_awarded_points(f64::NAN, 10).is_err());
    }

    #[test]
    fn test_course_grade_entry_validation() {
        let entry = |earned, possible| CourseGradeEntry {
            student_id: Uuid::new_v4(),
            points_earned: earned,
            points_possible: possible,
            comments: None,
        };
        assert_eq!(entry(85.0, 100.0).letter().unwrap(), "B");
        assert!(entry(5.0, 0.0).letter().is_err());
        assert!(entry(120.0, 100.0).letter().is_err());
        assert!(entry(-3.0, 100.0).letter().is_err());
    }

    #[test]
    fn test_grade_update_rederives_letter() {
        let update = GradeUpdate {
            points_earned: Some(72.0),
            ..Default::default()
        };
        assert_eq!(update.resolve(95.0, 100.0).unwrap(), (72.0, 100.0, "C"));

        let shrink = GradeUpdate {
            points_possible: Some(50.0),
            ..Default::default()
        };
        assert!(shrink.resolve(95.0, 100.0).is_err());
        assert_eq!(
            GradeUpdate::default().resolve(45.0, 50.0).unwrap(),
            (45.0, 50.0, "A")
        );
    }

    #[test]
    fn test_new_course_dates_ordered() {
        let course = NewCourse {
            title: "Intro".into(),
            code: "CS101".into(),
            description: String::new(),
            institution: String::new(),
            semester: String::new(),
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
        };
        let AppError::InvalidFields(fields) = course.validate().unwrap_err() else {
            panic!("expected field errors");
        };
        assert!(fields.get("end_date").is_some());
    }

    #[test]
    fn test_assignment_needs_positive_points() {
        let assignment = NewAssignment {
            title: "Essay".into(),
            description: String::new(),
            due_date: Utc::now(),
            total_points: 0,
        };
        assert!(assignment.validate().is_err());
    }
}
