//! Career guidance: catalogue browsing, the trait quiz and its recommendations.
//!
//! Submission pipeline: traits (aggregate) → recommend (score) → store (upsert).

pub mod catalog;
pub mod handlers;
pub mod recommend;
pub mod store;
pub mod submit;
pub mod traits;
