pub mod career;
pub mod jobs;
pub mod learning;
pub mod lms;
pub mod user;
