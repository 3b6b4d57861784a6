//! Learning resource catalogue, tracks and per-user progress tracking.

pub mod catalog;
pub mod handlers;
pub mod progress;
pub mod tracks;
