//! Guard behavior observed through the real HTTP surface.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use serde_json::{json, Value};

use gatehouse::security::pow;

mod common;

#[tokio::test]
async fn rate_limit_threshold_is_exact_per_route() {
    let (addr, shutdown) = common::spawn_server(|config| {
        config.ip_rate_limiter.profile.enable = true;
        config.ip_rate_limiter.profile.max_requests = 3;
        config.ip_rate_limiter.profile.window_ms = 60_000;
    })
    .await;
    let client = reqwest::Client::new();

    // Requests 1-3 pass the guard (and then fail auth, which proves the
    // guard ran first only when the fourth flips to 429).
    for _ in 0..3 {
        let response = client
            .get(common::url(addr, "/api/profile"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }

    let response = client
        .get(common::url(addr, "/api/profile"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "rate limit exceeded");

    // Other routes are not affected by the profile limiter.
    let response = client
        .post(common::url(addr, "/api/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn rate_limit_window_rolls_over() {
    let (addr, shutdown) = common::spawn_server(|config| {
        config.ip_rate_limiter.profile.enable = true;
        config.ip_rate_limiter.profile.max_requests = 1;
        config.ip_rate_limiter.profile.window_ms = 200;
    })
    .await;
    let client = reqwest::Client::new();

    let first = client
        .get(common::url(addr, "/api/profile"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 401);

    let second = client
        .get(common::url(addr, "/api/profile"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 429);

    tokio::time::sleep(std::time::Duration::from_millis(250)).await;

    let third = client
        .get(common::url(addr, "/api/profile"))
        .send()
        .await
        .unwrap();
    assert_eq!(third.status(), 401);

    shutdown.trigger();
}

#[tokio::test]
async fn oversized_body_is_rejected_before_decoding() {
    let (addr, shutdown) = common::spawn_server(|config| {
        config.body_limit.register.enable = true;
        config.body_limit.register.max_body_bytes = 64;
    })
    .await;
    let client = reqwest::Client::new();

    // Far over the ceiling and not valid JSON: a 400 here would mean the
    // decoder saw it. The guard must answer 429 first.
    let huge = "x".repeat(4096);
    let response = client
        .post(common::url(addr, "/api/register"))
        .header("content-type", "application/json")
        .body(huge)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);

    // A small payload still reaches validation.
    let response = client
        .post(common::url(addr, "/api/register"))
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    shutdown.trigger();
}

#[tokio::test]
async fn account_per_ip_cap_applies_inside_registration() {
    let (addr, shutdown) = common::spawn_server(|config| {
        config.account_per_ip_limiter.enable = true;
        config.account_per_ip_limiter.max_accounts = 2;
    })
    .await;
    let client = reqwest::Client::new();

    for name in ["alice", "bob"] {
        let response = client
            .post(common::url(addr, "/api/register"))
            .json(&json!({ "username": name, "password": "secret123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201, "registration for {} failed", name);
    }

    // Everything comes from 127.0.0.1, so the third account is over the cap.
    let response = client
        .post(common::url(addr, "/api/register"))
        .json(&json!({ "username": "carol", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);

    shutdown.trigger();
}

#[tokio::test]
async fn pow_gate_on_registration() {
    let (addr, shutdown) = common::spawn_server(|config| {
        config.proof_of_work.enable = true;
        config.proof_of_work.difficulty = 8;
        config.proof_of_work.ttl_seconds = 60;
        config.proof_of_work.secret_key = STANDARD.encode(b"integration-test-secret-key");
    })
    .await;
    let client = reqwest::Client::new();

    // Without a solution the register endpoint refuses uniformly.
    let response = client
        .post(common::url(addr, "/api/register"))
        .json(&json!({ "username": "alice", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Fetch and solve a challenge.
    let challenge: Value = client
        .get(common::url(addr, "/api/pow/challenge"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let seed = STANDARD_NO_PAD
        .decode(challenge["challenge"].as_str().unwrap())
        .unwrap();
    let difficulty = challenge["difficulty"].as_u64().unwrap() as u8;
    let nonce = pow::solve(&seed, difficulty);

    // A bogus nonce is rejected without detail.
    let mut bad_nonce = 0u64;
    while pow::meets_difficulty(&seed, bad_nonce, difficulty) {
        bad_nonce += 1;
    }
    let response = client
        .post(common::url(addr, "/api/register"))
        .header("X-PoW-Challenge", challenge["challenge"].as_str().unwrap())
        .header("X-PoW-Nonce", bad_nonce.to_string())
        .header("X-PoW-Token", challenge["token"].as_str().unwrap())
        .json(&json!({ "username": "alice", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // The real solution passes.
    let response = client
        .post(common::url(addr, "/api/register"))
        .header("X-PoW-Challenge", challenge["challenge"].as_str().unwrap())
        .header("X-PoW-Nonce", nonce.to_string())
        .header("X-PoW-Token", challenge["token"].as_str().unwrap())
        .json(&json!({ "username": "alice", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    shutdown.trigger();
}

#[tokio::test]
async fn pow_challenge_endpoint_advertises_disabled_state() {
    let (addr, shutdown) = common::spawn_server(|_| {}).await;
    let client = reqwest::Client::new();

    let response = client
        .get(common::url(addr, "/api/pow/challenge"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    shutdown.trigger();
}
