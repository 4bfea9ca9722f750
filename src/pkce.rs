//! PKCE helpers for the S256 challenge method.
//!
//! The verifier never leaves this process except inside the exchange request
//! to our own backend; only the derived challenge is sent to the provider.

use crate::digest::{self, DigestFn};
use crate::error::{ConnectError, ConnectResult};
use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;

/// Unreserved URI characters allowed in a code verifier (RFC 7636).
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Verifier length. The legal range is 43..=128; the longest is used for
/// maximum entropy.
pub const VERIFIER_LEN: usize = 128;

/// Encode bytes in the URL-safe base64 alphabet with padding stripped.
pub fn base64url_encode(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a code verifier from the OS randomness source.
///
/// Fails closed with `RandomnessUnavailable` if the OS RNG cannot produce
/// bytes; there is no fallback to a weaker generator.
pub fn generate_code_verifier() -> ConnectResult<String> {
    let mut out = String::with_capacity(VERIFIER_LEN);
    let mut buf = [0u8; 256];
    while out.len() < VERIFIER_LEN {
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| ConnectError::RandomnessUnavailable(e.to_string()))?;
        for b in buf {
            // Rejection sampling keeps the draw uniform over the 66-char set.
            if b < 198 {
                out.push(VERIFIER_CHARSET[(b % 66) as usize] as char);
                if out.len() == VERIFIER_LEN {
                    break;
                }
            }
        }
    }
    Ok(out)
}

/// Derive the S256 challenge: base64url(sha256(verifier)).
pub fn code_challenge_s256(verifier: &str) -> String {
    code_challenge_with(digest::digest, verifier)
}

/// Same derivation through an explicit digest backend.
pub fn code_challenge_with(digest: DigestFn, verifier: &str) -> String {
    base64url_encode(&digest(verifier.as_bytes()))
}

/// A generated verifier/challenge pair for one authorization attempt.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> ConnectResult<Self> {
        let verifier = generate_code_verifier()?;
        let challenge = code_challenge_s256(&verifier);
        Ok(Self { verifier, challenge })
    }
}
