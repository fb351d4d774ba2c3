//! Proof-of-work challenge issuance and verification.
//!
//! Challenges are stateless and self-certifying: the server hands out a
//! random seed plus a token binding `(seed, issued_at, difficulty)` under an
//! HMAC, and verifies solutions purely from what the client sends back. No
//! per-challenge storage exists, which also means a solved challenge can be
//! replayed until its TTL runs out; callers that need single-use semantics
//! would have to add a nonce cache on top.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::schema::PowSection;
use crate::http::response::ApiError;
use crate::security::{Guard, GuardContext};

type HmacSha256 = Hmac<Sha256>;

/// Headers carrying the solution on the protected endpoint.
pub const HEADER_CHALLENGE: &str = "x-pow-challenge";
pub const HEADER_NONCE: &str = "x-pow-nonce";
pub const HEADER_TOKEN: &str = "x-pow-token";

/// Random seed bytes per challenge.
const SEED_LEN: usize = 16;
/// Minimum decoded secret key length.
pub const MIN_KEY_BYTES: usize = 16;
/// Upper bound on difficulty; ~16M hashes average at 24 bits. Higher values
/// turn the puzzle into a client-side denial of service.
pub const MAX_DIFFICULTY: u8 = 24;

/// Fatal secret-key problems, surfaced at startup.
#[derive(Debug, Error)]
pub enum PowKeyError {
    #[error("proof_of_work.secret_key is missing or empty")]
    Missing,
    #[error("proof_of_work.secret_key must be valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("proof_of_work.secret_key too short: need at least {MIN_KEY_BYTES} decoded bytes")]
    TooShort,
}

/// Decode and vet the configured secret key.
pub fn decode_secret_key(raw: &str) -> Result<Vec<u8>, PowKeyError> {
    if raw.is_empty() {
        return Err(PowKeyError::Missing);
    }
    let key = STANDARD.decode(raw)?;
    if key.len() < MIN_KEY_BYTES {
        return Err(PowKeyError::TooShort);
    }
    Ok(key)
}

/// Challenge payload returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
    pub difficulty: u8,
    pub ttl_secs: i64,
    pub token: String,
}

/// Issues and verifies work-factor challenges.
pub struct PowGuard {
    enabled: bool,
    difficulty: u8,
    ttl_secs: i64,
    key: Vec<u8>,
}

impl PowGuard {
    pub fn from_config(section: &PowSection) -> Result<Self, PowKeyError> {
        if !section.enable {
            return Ok(Self::disabled());
        }
        let key = decode_secret_key(&section.secret_key)?;
        Ok(Self {
            enabled: true,
            difficulty: section.difficulty.min(MAX_DIFFICULTY),
            ttl_secs: section.ttl_seconds.max(1),
            key,
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            difficulty: 0,
            ttl_secs: 0,
            key: Vec::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Issue a fresh challenge. Callers must only invoke this when enabled.
    pub fn issue(&self) -> ChallengeResponse {
        self.issue_at(unix_now())
    }

    fn issue_at(&self, issued_at: i64) -> ChallengeResponse {
        let mut seed = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut seed);

        let mac = self.keyed_mac(&seed, issued_at).finalize().into_bytes();
        let mut token_bytes = Vec::with_capacity(8 + mac.len());
        token_bytes.extend_from_slice(&issued_at.to_be_bytes());
        token_bytes.extend_from_slice(&mac);

        ChallengeResponse {
            challenge: STANDARD_NO_PAD.encode(seed),
            difficulty: self.difficulty,
            ttl_secs: self.ttl_secs,
            token: STANDARD_NO_PAD.encode(token_bytes),
        }
    }

    /// MAC over `(seed, issued_at, difficulty)`.
    fn keyed_mac(&self, seed: &[u8], issued_at: i64) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(seed);
        mac.update(&issued_at.to_be_bytes());
        mac.update(&[self.difficulty]);
        mac
    }

    /// Verify a solution carried in request headers.
    ///
    /// Every failure collapses to the same rejection: a caller probing the
    /// verifier learns nothing about which of signature, expiry, or
    /// difficulty tripped it.
    pub fn verify(&self, ctx: &GuardContext<'_>) -> Result<(), ApiError> {
        self.verify_at(ctx, unix_now())
    }

    fn verify_at(&self, ctx: &GuardContext<'_>, now: i64) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }

        let challenge = header_str(ctx, HEADER_CHALLENGE).ok_or(ApiError::Unauthorized)?;
        let nonce = header_str(ctx, HEADER_NONCE).ok_or(ApiError::Unauthorized)?;
        let token = header_str(ctx, HEADER_TOKEN).ok_or(ApiError::Unauthorized)?;

        let seed = STANDARD_NO_PAD
            .decode(challenge)
            .map_err(|_| ApiError::Unauthorized)?;
        let token_bytes = STANDARD_NO_PAD
            .decode(token)
            .map_err(|_| ApiError::Unauthorized)?;
        if token_bytes.len() <= 8 {
            return Err(ApiError::Unauthorized);
        }
        let (ts_bytes, supplied_mac) = token_bytes.split_at(8);
        let issued_at = i64::from_be_bytes(ts_bytes.try_into().expect("split_at yields 8 bytes"));

        // Signature first: an attacker must not be able to probe expiry or
        // difficulty handling with forged tokens. verify_slice compares in
        // constant time.
        if self
            .keyed_mac(&seed, issued_at)
            .verify_slice(supplied_mac)
            .is_err()
        {
            return Err(ApiError::Unauthorized);
        }

        if now > issued_at.saturating_add(self.ttl_secs) {
            return Err(ApiError::Unauthorized);
        }

        let nonce: u64 = nonce.parse().map_err(|_| ApiError::Unauthorized)?;
        if !meets_difficulty(&seed, nonce, self.difficulty) {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}

impl Guard for PowGuard {
    fn name(&self) -> &'static str {
        "proof_of_work"
    }

    fn check(&self, ctx: &GuardContext<'_>) -> Result<(), ApiError> {
        self.verify(ctx)
    }
}

fn header_str<'a>(ctx: &'a GuardContext<'_>, name: &str) -> Option<&'a str> {
    ctx.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Does `SHA-256(seed || ascii(nonce))` carry at least `difficulty` leading
/// zero bits?
pub fn meets_difficulty(seed: &[u8], nonce: u64, difficulty: u8) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(nonce.to_string().as_bytes());
    leading_zero_bits(&hasher.finalize()) >= u32::from(difficulty.min(MAX_DIFFICULTY))
}

fn leading_zero_bits(digest: &[u8]) -> u32 {
    let mut bits = 0;
    for &byte in digest {
        if byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// Brute-force a nonce for a decoded seed. Client- and test-side helper; the
/// server never solves its own puzzles.
pub fn solve(seed: &[u8], difficulty: u8) -> u64 {
    let mut nonce: u64 = 0;
    loop {
        if meets_difficulty(seed, nonce, difficulty) {
            return nonce;
        }
        nonce += 1;
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}
