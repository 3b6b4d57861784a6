//! Course content bodies (modules, lessons, assignment edits) and the
//! module/lesson outline.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, FieldErrors};
use crate::models::lms::{LessonRow, ModuleRow};

/// A module with its lessons in `position` order.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleDetail {
    #[serde(flatten)]
    pub module: ModuleRow,
    pub lessons: Vec<LessonRow>,
}

/// Attaches lessons to their modules, keeping module order and sorting each
/// module's lessons by position. Lessons of unknown modules are dropped.
pub fn group_lessons(modules: Vec<ModuleRow>, lessons: Vec<LessonRow>) -> Vec<ModuleDetail> {
    let mut by_module: HashMap<Uuid, Vec<LessonRow>> = HashMap::new();
    for lesson in lessons {
        by_module.entry(lesson.module_id).or_default().push(lesson);
    }
    modules
        .into_iter()
        .map(|module| {
            let mut lessons = by_module.remove(&module.id).unwrap_or_default();
            lessons.sort_by_key(|l| (l.position, l.id));
            ModuleDetail { module, lessons }
        })
        .collect()
}

fn check_title(errors: &mut FieldErrors, title: Option<&str>) {
    if title.is_some_and(|t| t.trim().is_empty()) {
        errors.add("title", "This field may not be blank");
    }
}

fn check_non_negative(errors: &mut FieldErrors, field: &str, value: Option<i32>) {
    if value.is_some_and(|v| v < 0) {
        errors.add(field, "Must not be negative");
    }
}

#[derive(Debug, Deserialize)]
pub struct NewModule {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub position: i32,
    pub release_date: NaiveDate,
}

impl NewModule {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_title(&mut errors, Some(&self.title));
        check_non_negative(&mut errors, "position", Some(self.position));
        errors.into_result()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ModuleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
    pub release_date: Option<NaiveDate>,
}

impl ModuleUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_title(&mut errors, self.title.as_deref());
        check_non_negative(&mut errors, "position", self.position);
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct NewLesson {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub position: i32,
    /// Estimated duration in minutes.
    pub duration_minutes: i32,
}

impl NewLesson {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_title(&mut errors, Some(&self.title));
        check_non_negative(&mut errors, "position", Some(self.position));
        check_non_negative(&mut errors, "duration_minutes", Some(self.duration_minutes));
        errors.into_result()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub position: Option<i32>,
    pub duration_minutes: Option<i32>,
}

impl LessonUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_title(&mut errors, self.title.as_deref());
        check_non_negative(&mut errors, "position", self.position);
        check_non_negative(&mut errors, "duration_minutes", self.duration_minutes);
        errors.into_result()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignmentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub total_points: Option<i32>,
}

impl AssignmentUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_title(&mut errors, self.title.as_deref());
        if self.total_points.is_some_and(|p| p <= 0) {
            errors.add("total_points", "Total points must be greater than zero");
        }
        errors.into_result()
    }
}
