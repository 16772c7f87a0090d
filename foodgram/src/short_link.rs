//! Short recipe links.
//!
//! A short code is the recipe id written in base 62 (`0-9a-zA-Z`), so codes are stable, need no
//! storage and decode straight back to the id. `/s/<code>` redirects to the recipe page.

use crate::types::RecipeId;

const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encode a (non-negative) recipe id
pub fn encode(id: RecipeId) -> String {
    let mut n = id.max(0) as u64;
    if n == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while n > 0 {
        digits.push(ALPHABET[(n % 62) as usize]);
        n /= 62;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Decode a short code. Returns `None` for empty input, foreign characters or overflow.
pub fn decode(code: &str) -> Option<RecipeId> {
    if code.is_empty() {
        return None;
    }

    code.bytes().try_fold(0i64, |acc, byte| {
        let digit = ALPHABET.iter().position(|&c| c == byte)? as i64;
        acc.checked_mul(62)?.checked_add(digit)
    })
}

/// Public short link for a recipe
pub fn link_for(public_url: &url::Url, id: RecipeId) -> String {
    format!("{}/s/{}", public_url.as_str().trim_end_matches('/'), encode(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(encode(0), "0");
        assert_eq!(encode(9), "9");
        assert_eq!(encode(10), "a");
        assert_eq!(encode(61), "Z");
        assert_eq!(encode(62), "10");
        assert_eq!(encode(3843), "ZZ");
    }

    #[test]
    fn test_decode_inverts_encode() {
        for id in [1, 42, 61, 62, 12_345, 987_654_321, i64::MAX] {
            assert_eq!(decode(&encode(id)), Some(id), "id {id}");
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("ab-c"), None);
        assert_eq!(decode("é"), None);
        // Too large for an i64
        assert_eq!(decode("zzzzzzzzzzzzz"), None);
    }

    #[test]
    fn test_link_for() {
        let public = url::Url::parse("https://foodgram.example.com/").unwrap();
        assert_eq!(link_for(&public, 125), "https://foodgram.example.com/s/21");
    }
}
