//! Learning progress: status derived from completion percentage.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::{AppError, FieldErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "NOT_STARTED",
            ProgressStatus::InProgress => "IN_PROGRESS",
            ProgressStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOT_STARTED" => Ok(ProgressStatus::NotStarted),
            "IN_PROGRESS" => Ok(ProgressStatus::InProgress),
            "COMPLETED" => Ok(ProgressStatus::Completed),
            other => Err(format!("'{other}' is not a valid progress status")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressUpdate {
    pub status: Option<String>,
    pub completion_percentage: Option<i32>,
    pub notes: Option<String>,
}

/// Stored state the update is applied on top of.
#[derive(Debug, Clone, Copy)]
pub struct CurrentProgress {
    pub completion_percentage: i32,
    pub start_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
}

/// Fully resolved values to write back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressChange {
    pub status: ProgressStatus,
    pub completion_percentage: i32,
    pub start_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
}

/// 100 % is COMPLETED, 1–99 % IN_PROGRESS, 0 % NOT_STARTED unless a status
/// was given explicitly. An explicit COMPLETED with no percentage means 100 %.
pub fn apply_update(
    current: CurrentProgress,
    update: &ProgressUpdate,
    today: NaiveDate,
) -> Result<ProgressChange, AppError> {
    let mut errors = FieldErrors::new();

    let explicit = match update.status.as_deref().map(str::parse::<ProgressStatus>) {
        Some(Ok(status)) => Some(status),
        Some(Err(msg)) => {
            errors.add("status", msg);
            None
        }
        None => None,
    };

    let pct = match (update.completion_percentage, explicit) {
        (Some(p), _) => p,
        (None, Some(ProgressStatus::Completed)) => 100,
        (None, _) => current.completion_percentage,
    };
    if !(0..=100).contains(&pct) {
        errors.add("completion_percentage", "Must be between 0 and 100");
    }
    if explicit == Some(ProgressStatus::Completed) && pct != 100 {
        errors.add("status", "Completed resources must be at 100%");
    }
    errors.into_result()?;

    let status = match pct {
        100 => ProgressStatus::Completed,
        0 => match explicit {
            Some(ProgressStatus::InProgress) => ProgressStatus::InProgress,
            _ => ProgressStatus::NotStarted,
        },
        _ => ProgressStatus::InProgress,
    };

    let start_date = match status {
        ProgressStatus::NotStarted => current.start_date,
        _ => current.start_date.or(Some(today)),
    };
    let completion_date = match status {
        ProgressStatus::Completed => current.completion_date.or(Some(today)),
        _ => None,
    };

    Ok(ProgressChange {
        status,
        completion_percentage: pct,
        start_date,
        completion_date,
    })
}
