//! # Generate
//!
//! Random string generation for pre-authorized codes, issuer state, and
//! transaction codes.

use base64ct::{Base64UrlUnpadded, Encoding};

const TX_CODE_CHARS: &str = "0123456789";
const TX_CODE_LEN: usize = 6;

const SAFE_CHARS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789)(*&^%$#@!~";
const CODE_LEN: usize = 32;

/// Generates a base64 encoded random string for a pre-authorized code.
#[must_use]
pub fn pre_authorized_code() -> String {
    let rnd = random_string(CODE_LEN, SAFE_CHARS);
    Base64UrlUnpadded::encode_string(rnd.as_bytes())
}

/// Generates a base64 encoded random string for `issuer_state`.
#[must_use]
pub fn issuer_state() -> String {
    let rnd = random_string(CODE_LEN, SAFE_CHARS);
    Base64UrlUnpadded::encode_string(rnd.as_bytes())
}

/// Generates a Transaction Code (user PIN).
#[must_use]
pub fn tx_code() -> String {
    random_string(TX_CODE_LEN, TX_CODE_CHARS)
}

// Generates a random string from a given set of characters. Uses fastrand so
// is not cryptographically secure.
fn random_string(len: usize, charset: &str) -> String {
    let chars: Vec<char> = charset.chars().collect();
    (0..len).map(|_| chars[fastrand::usize(..chars.len())]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_code_is_numeric() {
        let code = tx_code();
        assert_eq!(code.len(), TX_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn codes_are_unique() {
        assert_ne!(pre_authorized_code(), pre_authorized_code());
    }
}
