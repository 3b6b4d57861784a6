//! Job posting and application vocabularies, plus the hiring pipeline rules.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::{AppError, FieldErrors};

pub const JOB_TYPES: [&str; 5] = ["FULL_TIME", "PART_TIME", "INTERNSHIP", "GRADUATE", "REMOTE"];
pub const JOB_STATUSES: [&str; 4] = ["DRAFT", "OPEN", "CLOSED", "FILLED"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApplicationStatus {
    Applied,
    Reviewed,
    Shortlisted,
    Hired,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "APPLIED",
            ApplicationStatus::Reviewed => "REVIEWED",
            ApplicationStatus::Shortlisted => "SHORTLISTED",
            ApplicationStatus::Hired => "HIRED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, ApplicationStatus::Hired | ApplicationStatus::Rejected)
    }

    /// Moves forward along APPLIED → REVIEWED → SHORTLISTED → HIRED (stages
    /// may be skipped) or to REJECTED from any non-final stage.
    pub fn can_move_to(self, next: ApplicationStatus) -> bool {
        if self.is_final() {
            return false;
        }
        next == ApplicationStatus::Rejected || next > self
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPLIED" => Ok(ApplicationStatus::Applied),
            "REVIEWED" => Ok(ApplicationStatus::Reviewed),
            "SHORTLISTED" => Ok(ApplicationStatus::Shortlisted),
            "HIRED" => Ok(ApplicationStatus::Hired),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            other => Err(format!("'{other}' is not a valid application status")),
        }
    }
}

/// Checks an employer's requested status change against the pipeline.
pub fn transition(current: &str, requested: &str) -> Result<ApplicationStatus, AppError> {
    let from = current
        .parse::<ApplicationStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("stored application status: {e}")))?;
    let to = requested
        .parse::<ApplicationStatus>()
        .map_err(AppError::Validation)?;
    if !from.can_move_to(to) {
        return Err(AppError::Validation(format!(
            "Cannot move an application from {from} to {to}"
        )));
    }
    Ok(to)
}

// ────────────────────────────────────────────────────────────────────────────
// Request bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub country: String,
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub responsibilities: String,
    pub benefits: Option<String>,
    pub salary_range: Option<String>,
    pub job_type: String,
    #[serde(default)]
    pub skills: String,
    pub application_deadline: NaiveDate,
    pub status: Option<String>,
    pub company_logo_url: Option<String>,
}

impl JobPosting {
    /// Validates the posting and returns the normalised status (default OPEN).
    pub fn validate(&self) -> Result<&'static str, AppError> {
        let mut errors = FieldErrors::new();
        for (field, value) in [
            ("title", &self.title),
            ("company", &self.company),
            ("location", &self.location),
            ("country", &self.country),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                errors.add(field, "This field may not be blank");
            }
        }
        if !JOB_TYPES.contains(&self.job_type.as_str()) {
            errors.add("job_type", format!("'{}' is not a valid job type", self.job_type));
        }
        let status = match self.status.as_deref() {
            None => Some("OPEN"),
            Some(s) => JOB_STATUSES.iter().copied().find(|known| *known == s),
        };
        if status.is_none() {
            errors.add("status", "Not a valid job status");
        }
        errors.into_result()?;
        Ok(status.unwrap_or("OPEN"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    #[test]
    fn test_pipeline_moves_forward() {
        assert!(Applied.can_move_to(Reviewed));
        assert!(Reviewed.can_move_to(Shortlisted));
        assert!(Shortlisted.can_move_to(Hired));
        assert!(Applied.can_move_to(Shortlisted));
        assert!(!Shortlisted.can_move_to(Reviewed));
        assert!(!Reviewed.can_move_to(Reviewed));
    }

    #[test]
    fn test_rejection_from_any_open_stage() {
        for stage in [Applied, Reviewed, Shortlisted] {
            assert!(stage.can_move_to(Rejected), "{stage}");
        }
    }

    #[test]
    fn test_final_states_are_terminal() {
        for next in [Applied, Reviewed, Shortlisted, Hired, Rejected] {
            assert!(!Hired.can_move_to(next));
            assert!(!Rejected.can_move_to(next));
        }
    }

    #[test]
    fn test_transition_validates_input() {
        assert_eq!(transition("APPLIED", "reviewed").unwrap(), Reviewed);
        assert!(matches!(
            transition("APPLIED", "PROMOTED"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            transition("HIRED", "REJECTED"),
            Err(AppError::Validation(_))
        ));
    }

    fn posting() -> JobPosting {
        JobPosting {
            title: "Junior Analyst".into(),
            company: "Acme".into(),
            location: "Harare".into(),
            country: "Zimbabwe".into(),
            description: "Crunch numbers".into(),
            requirements: String::new(),
            responsibilities: String::new(),
            benefits: None,
            salary_range: None,
            job_type: "FULL_TIME".into(),
            skills: "excel, sql".into(),
            application_deadline: NaiveDate::from_ymd_opt(2030, 1, 31).unwrap(),
            status: None,
            company_logo_url: None,
        }
    }

    #[test]
    fn test_posting_defaults_to_open() {
        assert_eq!(posting().validate().unwrap(), "OPEN");
    }

    #[test]
    fn test_posting_rejects_unknown_vocabulary() {
        let mut job = posting();
        job.job_type = "GIG".into();
        job.status = Some("ARCHIVED".into());
        job.title = " ".into();
        let AppError::InvalidFields(fields) = job.validate().unwrap_err() else {
            panic!("expected field errors");
        };
        for field in ["job_type", "status", "title"] {
            assert!(fields.get(field).is_some(), "{field}");
        }
    }
}
