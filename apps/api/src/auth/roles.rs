//! Roles and the capability table.
//!
//! Every permission decision that depends only on *who* the caller is goes
//! through [`is_allowed`]. Ownership rules ("only this course's instructor")
//! stay next to the rows they guard.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "O_LEVEL")]
    OLevelStudent,
    #[serde(rename = "A_LEVEL")]
    ALevelStudent,
    #[serde(rename = "TERTIARY")]
    TertiaryStudent,
    #[serde(rename = "LECTURER")]
    Lecturer,
    #[serde(rename = "MENTOR")]
    Mentor,
    #[serde(rename = "EMPLOYER")]
    Employer,
    #[serde(rename = "INST_ADMIN")]
    InstitutionAdmin,
    #[serde(rename = "MIN_ADMIN")]
    MinistryAdmin,
    #[serde(rename = "SUPERUSER")]
    Superuser,
    #[serde(rename = "GENERAL")]
    General,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::OLevelStudent,
        Role::ALevelStudent,
        Role::TertiaryStudent,
        Role::Lecturer,
        Role::Mentor,
        Role::Employer,
        Role::InstitutionAdmin,
        Role::MinistryAdmin,
        Role::Superuser,
        Role::General,
    ];

    /// Database / header code for the role.
    pub fn code(self) -> &'static str {
        match self {
            Role::OLevelStudent => "O_LEVEL",
            Role::ALevelStudent => "A_LEVEL",
            Role::TertiaryStudent => "TERTIARY",
            Role::Lecturer => "LECTURER",
            Role::Mentor => "MENTOR",
            Role::Employer => "EMPLOYER",
            Role::InstitutionAdmin => "INST_ADMIN",
            Role::MinistryAdmin => "MIN_ADMIN",
            Role::Superuser => "SUPERUSER",
            Role::General => "GENERAL",
        }
    }

    pub fn is_student(self) -> bool {
        matches!(
            self,
            Role::OLevelStudent | Role::ALevelStudent | Role::TertiaryStudent
        )
    }

    pub fn is_admin(self) -> bool {
        matches!(
            self,
            Role::InstitutionAdmin | Role::MinistryAdmin | Role::Superuser
        )
    }

    /// Roles a user may pick for themselves at registration.
    pub fn is_self_assignable(self) -> bool {
        !self.is_admin()
    }

    /// Roles whose profiles need an administrator's approval before they are trusted.
    pub fn requires_approval(self) -> bool {
        matches!(self, Role::Lecturer | Role::Mentor | Role::Employer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}

/// Every role-gated action the API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    // Open to any authenticated caller
    ViewCatalog,
    TakeCareerQuiz,
    ViewOwnRecords,
    ManageSavedItems,
    ManageResumes,
    TrackLearningProgress,
    // Students
    RequestStudyRecommendations,
    EnrollInCourse,
    SubmitAssignment,
    ApplyForJob,
    // Lecturers
    CreateCourse,
    ManageCourseContent,
    GradeStudents,
    // Employers
    PostJob,
    ReviewApplications,
    BrowseCandidateResumes,
    // Content curation
    PublishLearningResource,
}

/// Pure capability check: may a user holding `role` perform `operation`?
pub fn is_allowed(role: Role, operation: Operation) -> bool {
    use Operation::*;

    if role == Role::Superuser {
        return true;
    }

    match operation {
        ViewCatalog | TakeCareerQuiz | ViewOwnRecords | ManageSavedItems | ManageResumes
        | TrackLearningProgress => true,
        RequestStudyRecommendations | EnrollInCourse | SubmitAssignment | ApplyForJob => {
            role.is_student()
        }
        CreateCourse | ManageCourseContent | GradeStudents => role == Role::Lecturer,
        PostJob | ReviewApplications | BrowseCandidateResumes => role == Role::Employer,
        PublishLearningResource => role == Role::Lecturer || role.is_admin(),
    }
}
