//! Credential generation for the callback channel.
//!
//! The admin console expects a Token of up to 32 alphanumerics and a 43-char
//! EncodingAESKey ("letters or digits only") that base64-decodes to 32 bytes
//! once a single `=` is appended.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;

const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate an alphanumeric Token. Lengths outside 1..=32 clamp to 32.
pub fn generate_token(len: usize) -> String {
    let len = if len == 0 || len > 32 { 32 } else { len };
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALNUM[rng.gen_range(0..ALNUM.len())] as char)
        .collect()
}

/// Generate a 43-character EncodingAESKey from 32 random bytes.
///
/// The console rejects `+` and `/`, so rejection-sample until the base64 text
/// is purely alphanumeric.
pub fn generate_encoding_aes_key() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let mut key_bytes = [0u8; 32];
        rng.fill(&mut key_bytes);
        let b64 = BASE64.encode(key_bytes);
        let trimmed = b64.trim_end_matches('=');
        if trimmed.len() == 43 && trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return trimmed.to_string();
        }
    }
}

/// Check an EncodingAESKey: exactly 43 chars, decoding to 32 bytes with `=`.
pub fn verify_encoding_aes_key(key: &str) -> bool {
    if key.len() != 43 {
        return false;
    }
    match BASE64.decode(format!("{key}=").as_bytes()) {
        Ok(bytes) => bytes.len() == 32,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_alnum_and_length() {
        for &len in &[8usize, 16, 32] {
            let t = generate_token(len);
            assert_eq!(t.len(), len);
            assert!(t.chars().all(|ch| ch.is_ascii_alphanumeric()));
        }
        assert_eq!(generate_token(64).len(), 32);
        assert_eq!(generate_token(0).len(), 32);
    }

    #[test]
    fn generated_key_verifies_and_decodes() {
        let key = generate_encoding_aes_key();
        assert_eq!(key.len(), 43);
        assert!(key.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert!(verify_encoding_aes_key(&key));
        let raw = BASE64.decode(format!("{key}=").as_bytes()).expect("decode");
        assert_eq!(raw.len(), 32);
    }

    #[test]
    fn verify_rejects_wrong_shapes() {
        assert!(!verify_encoding_aes_key(""));
        assert!(!verify_encoding_aes_key("short"));
        assert!(!verify_encoding_aes_key(&"a".repeat(44)));
        // 43 chars but invalid base64 content
        assert!(!verify_encoding_aes_key(&"!".repeat(43)));
    }
}
