//! Human-readable payment references

use chrono::{DateTime, Utc};
use rand::Rng;

const SUFFIX_LEN: usize = 6;
// Excludes 0/O and 1/I
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generates `PAY-<yyyymmddHHMMSS>-<suffix>`
///
/// Uniqueness is enforced by the store, not here.
pub fn generate(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("PAY-{}-{}", now.format("%Y%m%d%H%M%S"), suffix)
}
