//! Courses, enrolment, assignments and grading.

pub mod content;
pub mod grading;
pub mod handlers;
