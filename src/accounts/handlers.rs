//! HTTP handlers for the account API.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header::SET_COOKIE, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::db::RegisterOutcome;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::GuardContext;

#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// `GET /api/pow/challenge`
///
/// 204 when proof-of-work is disabled so clients know to register without
/// solving anything.
pub async fn pow_challenge(State(state): State<AppState>) -> Response {
    if !state.pow.enabled() {
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(state.pow.issue()).into_response()
}

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let ctx = GuardContext::from_parts(&parts);

    state.register.chain.check(&ctx)?;

    let input: Credentials = read_json(body, state.register.body_cap).await?;
    let username = input.username.trim().to_string();
    if username.is_empty() || input.password.is_empty() {
        return Err(ApiError::Validation(
            "username and password required".into(),
        ));
    }

    let hash = state.hasher.hash(input.password).await?;
    let ip = ctx.ip.map(|ip| ip.to_string()).unwrap_or_default();

    let outcome = state
        .store
        .register_account(&username, &hash, &ip, state.account_cap)
        .await?;

    match outcome {
        RegisterOutcome::IpCapExceeded => Err(ApiError::RateLimited),
        RegisterOutcome::Created(user) => {
            tracing::info!(user_id = user.id, username = %user.username, "account created");
            Ok((
                StatusCode::CREATED,
                Json(json!({ "id": user.id, "username": user.username })),
            )
                .into_response())
        }
    }
}

/// `POST /api/login`
pub async fn login(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let ctx = GuardContext::from_parts(&parts);

    state.login.chain.check(&ctx)?;

    let input: Credentials = read_json(body, state.login.body_cap).await?;
    if input.username.is_empty() || input.password.is_empty() {
        return Err(ApiError::Validation(
            "username and password required".into(),
        ));
    }

    // Unknown user and wrong password present identically.
    let user = state
        .store
        .user_by_username(input.username.trim())
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let verified = state
        .hasher
        .verify(input.password, user.password_hash.clone())
        .await?;
    if !verified {
        return Err(ApiError::Unauthorized);
    }

    let cookie = state.sessions.issue(user.id).await?;
    tracing::info!(user_id = user.id, "login");

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({ "id": user.id, "username": user.username })),
    )
        .into_response())
}

/// `POST /api/logout`
///
/// Always 200: logging out without a session is success, not an error.
pub async fn logout(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let (parts, _body) = request.into_parts();
    let ctx = GuardContext::from_parts(&parts);

    state.logout.chain.check(&ctx)?;

    state.sessions.revoke(&parts.headers).await;

    Ok((
        AppendHeaders([(SET_COOKIE, state.sessions.clear_cookie())]),
        Json(json!({ "status": "ok", "message": "logged out" })),
    )
        .into_response())
}

/// `GET /api/profile`
pub async fn profile(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, _body) = request.into_parts();
    let ctx = GuardContext::from_parts(&parts);

    state.profile.chain.check(&ctx)?;

    let session = state.sessions.resolve(&parts.headers).await?;
    let user = state
        .store
        .user_by_id(session.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(json!({
        "id": user.id,
        "username": user.username,
        "created": user.created_at,
    }))
    .into_response())
}

/// Drain the body under the route's byte ceiling, then decode JSON.
///
/// The cap applies to the stream itself, so an oversized payload is cut off
/// before the decoder runs regardless of what `Content-Length` claimed.
async fn read_json<T: serde::de::DeserializeOwned>(body: Body, cap: usize) -> Result<T, ApiError> {
    let bytes = axum::body::to_bytes(body, cap)
        .await
        .map_err(|_| ApiError::RateLimited)?;
    serde_json::from_slice(&bytes).map_err(|_| ApiError::Validation("invalid json".into()))
}
