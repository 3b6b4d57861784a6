//! User profiles, notifications and saved items.

pub mod handlers;
pub mod profile;
