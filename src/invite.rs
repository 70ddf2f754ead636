//! Invite code formatting.
//!
//! Codes are stored uppercase without separators and shown lowercase.

use rand::{distributions::Alphanumeric, Rng};

/// Length of generated codes
pub const INVITE_CODE_LEN: usize = 8;

/// Canonical form used for storage and lookups: ASCII letters and digits, uppercased
pub fn normalize_invite_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Form shown to people
pub fn display_invite_code(code: &str) -> String {
    normalize_invite_code(code).to_ascii_lowercase()
}

/// A fresh random code in canonical form
pub fn generate_invite_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}
