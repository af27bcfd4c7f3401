use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Constant-time token comparison.
///
/// Both sides are hashed first so neither the content nor the length of the
/// stored token leaks through timing. A missing or empty token never matches.
pub fn secure_compare(stored: Option<&str>, presented: &str) -> bool {
    let Some(stored) = stored else {
        return false;
    };
    if stored.is_empty() || presented.is_empty() {
        return false;
    }

    let stored = Sha256::digest(stored.as_bytes());
    let presented = Sha256::digest(presented.as_bytes());

    stored.as_slice().ct_eq(presented.as_slice()).into()
}
