//! Universal Identification Numbers: `NS-<year>-<5 chars [A-Z0-9]>`.

use chrono::{Datelike, Utc};
use uuid::Uuid;

const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 5;

/// Generates a fresh UIN for the current year.
pub fn generate_uin() -> String {
    let entropy = Uuid::new_v4();
    let uin = uin_from(Utc::now().year(), entropy.as_bytes());
    debug_assert!(is_valid_uin(&uin));
    uin
}

fn uin_from(year: i32, entropy: &[u8]) -> String {
    let suffix: String = entropy
        .iter()
        .take(SUFFIX_LEN)
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect();
    format!("NS-{year}-{suffix}")
}

pub fn is_valid_uin(uin: &str) -> bool {
    let mut parts = uin.splitn(3, '-');
    let (Some("NS"), Some(year), Some(suffix)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    year.len() == 4
        && year.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| ALPHABET.contains(&b))
}
