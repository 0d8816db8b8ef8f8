//! AES-256-CBC message crypto for WeCom callbacks.
//!
//! The platform derives the key from the 43-char EncodingAESKey: append one
//! `=`, base64-decode to 32 bytes, and reuse the first 16 bytes of that same
//! key as the CBC IV. PKCS7 padding is applied to a 32-byte boundary, not the
//! AES block size. Both quirks are wire-contract, preserved exactly; do not
//! reuse this construction elsewhere.
//!
//! Decrypted payload layout:
//! `16B random | 4B big-endian msg_len | msg(msg_len) | receiver_id`

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use thiserror::Error;

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::cipher::block_padding::NoPadding;

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// PKCS7 block boundary used by the platform (twice the AES block size).
const PAD_BLOCK: usize = 32;

/// Structural or cryptographic failure while opening a ciphertext.
///
/// A recovered receiver id that does not match the configured tenant is NOT a
/// `CipherError`; the caller performs that comparison so the two failure modes
/// stay distinguishable in logs and HTTP status codes.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid base64: {0}")]
    Base64(String),
    #[error("invalid aes key length")]
    InvalidKey,
    #[error("ciphertext length {0} is not a positive multiple of the aes block size")]
    BadCiphertextLength(usize),
    #[error("crypto error")]
    Crypto,
    #[error("invalid pkcs7 pad byte {0}")]
    BadPadding(u8),
    #[error("bad message format")]
    BadFormat,
    #[error("utf8 decode error: {0}")]
    Utf8(String),
}

/// Result of opening a ciphertext: the embedded plaintext and the trailing
/// receiver id (corp id / tenant id) the platform appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub plaintext: String,
    pub receiver_id: String,
}

/// Cipher bound to one channel's EncodingAESKey.
#[derive(Clone)]
pub struct ChannelCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for ChannelCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of Debug output.
        f.debug_struct("ChannelCipher").finish_non_exhaustive()
    }
}

impl ChannelCipher {
    /// Build a cipher from the 43-char EncodingAESKey.
    ///
    /// One `=` is appended unless already present; the padded string must
    /// base64-decode to exactly 32 bytes.
    pub fn new(encoding_aes_key: &str) -> Result<Self, CipherError> {
        let key_b64 = if encoding_aes_key.ends_with('=') {
            encoding_aes_key.to_string()
        } else {
            let mut s = encoding_aes_key.to_string();
            s.push('=');
            s
        };
        let key = BASE64
            .decode(key_b64.as_bytes())
            .map_err(|e| CipherError::Base64(e.to_string()))?;
        let key: [u8; 32] = key
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::InvalidKey)?;
        Ok(Self { key })
    }

    fn iv(&self) -> &[u8] {
        &self.key[..16]
    }

    /// Decrypt a base64 `Encrypt`/`echostr` value and split it into plaintext
    /// and the trailing receiver id.
    pub fn open(&self, ciphertext_b64: &str) -> Result<Opened, CipherError> {
        let cipher_bytes = BASE64
            .decode(normalize_b64(ciphertext_b64).as_bytes())
            .map_err(|e| CipherError::Base64(e.to_string()))?;
        if cipher_bytes.is_empty() || cipher_bytes.len() % 16 != 0 {
            return Err(CipherError::BadCiphertextLength(cipher_bytes.len()));
        }

        let mut buf = cipher_bytes;
        let plain = Aes256CbcDec::new_from_slices(&self.key, self.iv())
            .map_err(|_| CipherError::InvalidKey)?
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| CipherError::Crypto)?;

        // Manual PKCS7 strip: the platform pads to a 32-byte boundary, so the
        // pad byte may exceed the 16-byte block size a stock unpadder accepts.
        let pad = *plain.last().ok_or(CipherError::BadFormat)? as usize;
        if pad == 0 || pad > PAD_BLOCK || pad >= plain.len() {
            return Err(CipherError::BadPadding(pad as u8));
        }
        let content = &plain[..plain.len() - pad];

        if content.len() < 20 {
            return Err(CipherError::BadFormat);
        }
        let body = &content[16..];
        let msg_len = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
        // Never trust the embedded length beyond the remaining buffer.
        if body.len() - 4 < msg_len {
            return Err(CipherError::BadFormat);
        }
        let msg = &body[4..4 + msg_len];
        let receiver = &body[4 + msg_len..];

        Ok(Opened {
            plaintext: String::from_utf8(msg.to_vec())
                .map_err(|e| CipherError::Utf8(e.to_string()))?,
            receiver_id: std::str::from_utf8(receiver)
                .map_err(|e| CipherError::Utf8(e.to_string()))?
                .to_string(),
        })
    }

    /// Encrypt a plaintext for the given receiver id, producing the base64
    /// value that goes into an `Encrypt` field.
    pub fn seal(&self, plaintext: &str, receiver_id: &str) -> Result<String, CipherError> {
        let mut prefix = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut prefix);
        self.seal_with_prefix(plaintext, receiver_id, prefix)
    }

    /// Deterministic variant used by tests; production callers use [`seal`].
    pub(crate) fn seal_with_prefix(
        &self,
        plaintext: &str,
        receiver_id: &str,
        prefix: [u8; 16],
    ) -> Result<String, CipherError> {
        let msg = plaintext.as_bytes();
        let msg_len = u32::try_from(msg.len()).map_err(|_| CipherError::BadFormat)?;

        let mut buf = Vec::with_capacity(20 + msg.len() + receiver_id.len() + PAD_BLOCK);
        buf.extend_from_slice(&prefix);
        buf.extend_from_slice(&msg_len.to_be_bytes());
        buf.extend_from_slice(msg);
        buf.extend_from_slice(receiver_id.as_bytes());

        let pad = PAD_BLOCK - (buf.len() % PAD_BLOCK);
        buf.extend(std::iter::repeat(pad as u8).take(pad));

        let len = buf.len();
        let ct = Aes256CbcEnc::new_from_slices(&self.key, self.iv())
            .map_err(|_| CipherError::InvalidKey)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| CipherError::Crypto)?;
        Ok(BASE64.encode(ct))
    }
}

/// Build the encrypted XML reply: seal the plaintext, sign the ciphertext, and
/// wrap both in the outbound envelope the platform expects from a passive
/// response.
pub fn seal_reply(
    cipher: &ChannelCipher,
    token: &str,
    receiver_id: &str,
    plaintext: &str,
    timestamp: &str,
    nonce: &str,
) -> Result<String, CipherError> {
    let encrypt = cipher.seal(plaintext, receiver_id)?;
    let signature = crate::signature::compute_signature(token, timestamp, nonce, &encrypt);
    Ok(crate::envelope::render_encrypted(
        &encrypt, &signature, timestamp, nonce,
    ))
}

/// Normalize base64: map the URL-safe alphabet back to standard and restore
/// missing `=` padding. The platform url-encodes `echostr`, and intermediate
/// proxies have been seen mangling it both ways.
fn normalize_b64(s: &str) -> String {
    let mut t = s.trim().replace('-', "+").replace('_', "/");
    match t.len() % 4 {
        2 => t.push_str("=="),
        3 => t.push('='),
        1 => t.push_str("==="),
        _ => {}
    }
    t
}
