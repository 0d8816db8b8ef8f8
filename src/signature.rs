//! Callback signature verification (SHA1 over lexicographically sorted parts).
//!
//! WeCom signs every callback with `sha1(sort(token, timestamp, nonce, payload))`
//! where `payload` is the still-encrypted `echostr` (GET challenge) or the
//! `Encrypt` field body (POST delivery). The sort-and-concatenate scheme is the
//! platform's wire contract; keep it bit-for-bit, do not substitute a keyed HMAC.

use sha1::{Digest, Sha1};

/// Compute the SHA1 signature: sort parts lexicographically, concatenate with no
/// separator, hash the UTF-8 bytes, hex-encode lowercase.
pub fn sha1_signature(parts: &[&str]) -> String {
    let mut v = parts.to_vec();
    v.sort_unstable();
    let mut hasher = Sha1::new();
    for p in v {
        hasher.update(p.as_bytes());
    }
    let digest = hasher.finalize();
    let mut s = String::with_capacity(digest.len() * 2);
    for b in digest {
        use core::fmt::Write;
        let _ = write!(&mut s, "{:02x}", b);
    }
    s
}

/// Compute the message signature over the four callback inputs.
///
/// The result is invariant to argument order because the parts are sorted
/// internally; callers still pass them in protocol order for readability.
pub fn compute_signature(token: &str, timestamp: &str, nonce: &str, payload: &str) -> String {
    sha1_signature(&[token, timestamp, nonce, payload])
}

/// Verify a claimed message signature.
///
/// Fails closed: any empty input yields `false` without computing a digest,
/// so a partially-missing request can never match. The claimed value is
/// compared ASCII-case-insensitively (the platform occasionally uppercases).
pub fn verify(
    token: &str,
    timestamp: &str,
    nonce: &str,
    payload: &str,
    claimed: &str,
) -> bool {
    if token.is_empty()
        || timestamp.is_empty()
        || nonce.is_empty()
        || payload.is_empty()
        || claimed.is_empty()
    {
        return false;
    }
    compute_signature(token, timestamp, nonce, payload).eq_ignore_ascii_case(claimed)
}
