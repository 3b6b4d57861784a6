//! Jobs board: postings, resumes (with S3 file upload) and applications.

pub mod handlers;
pub mod postings;
pub mod upload;
