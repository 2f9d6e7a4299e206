use rand::distributions::Alphanumeric;
use rand::Rng;

pub const KEY_LEN: usize = 8;

/// Suffix length used by the SMS approval commands (e.g. "YES AB12").
pub const SUFFIX_LEN: usize = 4;

/// Generate a short uppercase booking key, e.g. "K7QX2M9A".
pub fn generate() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LEN)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect()
}
