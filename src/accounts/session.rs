//! Session issuance, resolution, and revocation.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::db::{Session, Store};
use crate::http::response::ApiError;

pub const SESSION_COOKIE: &str = "gatehouse_sess";
/// Sessions live for 30 days.
pub const SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

const TOKEN_BYTES: usize = 32;

/// Mediates the session rows in the store and the cookie on the wire.
///
/// The manager never caches sessions: every resolution is a fresh lookup, and
/// expiry is enforced lazily at lookup time.
#[derive(Clone)]
pub struct SessionManager {
    store: Store,
    /// Whether to stamp `Secure` on cookies. True when the server terminates
    /// TLS; false keeps unencrypted local development working.
    secure_cookies: bool,
}

impl SessionManager {
    pub fn new(store: Store, secure_cookies: bool) -> Self {
        Self {
            store,
            secure_cookies,
        }
    }

    /// Create a session for a user and return the `Set-Cookie` value.
    pub async fn issue(&self, user_id: i64) -> Result<String, ApiError> {
        let mut raw = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut raw);
        let token = hex::encode(raw);

        let expires_at = unix_now() + SESSION_TTL_SECS;
        self.store.create_session(&token, user_id, expires_at).await?;

        Ok(self.format_cookie(&token, SESSION_TTL_SECS))
    }

    /// Resolve the session carried by the request cookie.
    ///
    /// Absent cookie, unknown token, and expired token all yield the same
    /// `Unauthorized`; an expired row is deleted on the way out so the table
    /// cleans itself up under normal traffic.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Session, ApiError> {
        let token = token_from_headers(headers).ok_or(ApiError::Unauthorized)?;

        let session = self
            .store
            .session_by_token(&token)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if unix_now() > session.expires_at {
            if let Err(e) = self.store.delete_session(&token).await {
                tracing::debug!(error = %e, "failed to delete expired session");
            }
            return Err(ApiError::Unauthorized);
        }

        Ok(session)
    }

    /// Delete the request's session, if any. Idempotent: no cookie and no
    /// matching row are both success.
    pub async fn revoke(&self, headers: &HeaderMap) {
        if let Some(token) = token_from_headers(headers) {
            if let Err(e) = self.store.delete_session(&token).await {
                tracing::debug!(error = %e, "failed to delete session on logout");
            }
        }
    }

    /// `Set-Cookie` value that removes the session cookie on the client.
    pub fn clear_cookie(&self) -> String {
        let mut cookie = format!(
            "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax",
            SESSION_COOKIE
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn format_cookie(&self, token: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, token, max_age
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Extract the session token from the request's `Cookie` header(s).
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == SESSION_COOKIE {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}
