//! Password login, refresh rotation and revocation over HTTP.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{
    PASSWORD, TEST_IP, TestSetup, body_json, cookie_value, has_cleared_cookie, json_request,
    set_cookies, setup,
};
use serde_json::json;
use tokenward::jwt::fingerprint;

#[tokio::test]
async fn test_register_creates_user_without_tokens() {
    let app = setup().await;

    let response = app.register("Alice@Example.com ").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(set_cookies(&response).is_empty(), "register issues no cookies");

    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["name"], "Test User");
    assert!(body["user"]["id"].as_str().is_some());
    assert!(body.get("access_token").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = setup().await;

    assert_eq!(app.register("bob@example.com").await.status(), StatusCode::CREATED);

    let response = app.register("BOB@example.com").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["reason"], "conflict");
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = setup().await;

    let weak = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            json!({ "email": "carol@example.com", "password": "short" }),
        ))
        .await;
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(weak).await["reason"], "validation");

    let bad_email = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            json!({ "email": "not-an-email", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let mismatch = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            json!({
                "email": "carol@example.com",
                "password": PASSWORD,
                "confirm_password": "Other-pass1"
            }),
        ))
        .await;
    assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_malformed_json_is_bad_request() {
    let app = setup().await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header("content-type", "application/json")
                .body(Body::from("{\"email\": "))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_sets_http_only_cookies() {
    let app = setup().await;
    app.register("dave@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "dave@example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    for cookie in &cookies {
        assert!(cookie.contains("HttpOnly"), "cookie: {}", cookie);
        assert!(cookie.contains("SameSite=Lax"), "cookie: {}", cookie);
        assert!(cookie.contains("Path=/"), "cookie: {}", cookie);
        assert!(!cookie.contains("Secure"), "cookie: {}", cookie);
    }
    assert!(cookie_value(&cookies, "refresh_token").is_some());
    assert!(cookie_value(&cookies, "session_id").is_some());

    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 15 * 60);
    assert_eq!(body["user"]["email"], "dave@example.com");
    assert!(body["access_token"].as_str().is_some());
}

#[tokio::test]
async fn test_production_cookies_are_strict_and_secure() {
    let app = TestSetup::new().with_production(true).build().await;
    app.register("erin@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "erin@example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    for cookie in set_cookies(&response) {
        assert!(cookie.contains("SameSite=Strict"), "cookie: {}", cookie);
        assert!(cookie.contains("Secure"), "cookie: {}", cookie);
    }
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_uniformly() {
    let app = setup().await;
    app.register("frank@example.com").await;

    let wrong_password = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "frank@example.com", "password": "Wrong-pass1" }),
        ))
        .await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&wrong_password).is_empty());
    let wrong_password = body_json(wrong_password).await;

    let unknown_email = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "nobody@example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    let unknown_email = body_json(unknown_email).await;

    assert_eq!(wrong_password["reason"], "invalid_credentials");
    assert_eq!(wrong_password, unknown_email);
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let app = setup().await;
    app.register("grace@example.com").await;
    let login = app.login("grace@example.com").await;

    let response = app.refresh(&login.refresh_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    let rotated = cookie_value(&cookies, "refresh_token").expect("new refresh cookie");
    assert_ne!(rotated, login.refresh_token);
    assert!(cookie_value(&cookies, "session_id").is_none());

    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().is_some());
    assert!(body.get("user").is_none());

    let old = app
        .db
        .refresh_tokens()
        .find_by_hash(&fingerprint(&login.refresh_token))
        .await
        .unwrap()
        .unwrap();
    assert!(old.revoked.is_some());
    assert_eq!(old.replaced_by_hash.as_deref(), Some(fingerprint(&rotated).as_str()));

    let new = app
        .db
        .refresh_tokens()
        .find_by_hash(&fingerprint(&rotated))
        .await
        .unwrap()
        .unwrap();
    assert!(new.revoked.is_none());
    assert_eq!(new.ip.as_deref(), Some(TEST_IP));
}

#[tokio::test]
async fn test_refresh_replay_revokes_family() {
    let app = setup().await;
    app.register("heidi@example.com").await;
    let login = app.login("heidi@example.com").await;

    let first = app.refresh(&login.refresh_token).await;
    assert_eq!(first.status(), StatusCode::OK);
    let successor = cookie_value(&set_cookies(&first), "refresh_token").unwrap();

    // Presenting the already-rotated token again
    let replay = app.refresh(&login.refresh_token).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert!(has_cleared_cookie(&set_cookies(&replay), "refresh_token"));
    assert_eq!(body_json(replay).await["reason"], "reuse_detected");

    // The legitimate successor died with the family
    let after = app.refresh(&successor).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(after).await["reason"], "inactive_token");
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let app = setup().await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(has_cleared_cookie(&set_cookies(&response), "refresh_token"));
    assert_eq!(body_json(response).await["reason"], "not_authenticated");
}

#[tokio::test]
async fn test_refresh_with_garbage_cookie() {
    let app = setup().await;

    let response = app.refresh("not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(has_cleared_cookie(&set_cookies(&response), "refresh_token"));
    assert_eq!(body_json(response).await["reason"], "malformed_token");
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = setup().await;
    app.register("ivan@example.com").await;
    let login = app.login("ivan@example.com").await;

    let response = app.refresh(&login.access_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["reason"], "malformed_token");

    // The real refresh token is untouched
    assert_eq!(app.refresh(&login.refresh_token).await.status(), StatusCode::OK);
}

fn logout_request(refresh_token: &str, session_id: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header(
            "cookie",
            format!("refresh_token={}; session_id={}", refresh_token, session_id),
        )
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let app = setup().await;
    app.register("judy@example.com").await;
    let login = app.login("judy@example.com").await;

    let response = app
        .send(logout_request(&login.refresh_token, &login.session_id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(has_cleared_cookie(&cookies, "refresh_token"));
    assert!(has_cleared_cookie(&cookies, "session_id"));
    assert_eq!(body_json(response).await["revoked"], true);

    let again = app
        .send(logout_request(&login.refresh_token, &login.session_id))
        .await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(body_json(again).await["revoked"], false);

    let refresh = app.refresh(&login.refresh_token).await;
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(refresh).await["reason"], "inactive_token");

    let me = app.get_with_session("/api/users/me", &login.session_id).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_cookies() {
    let app = setup().await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["revoked"], false);
}

#[tokio::test]
async fn test_logout_all_revokes_every_token() {
    let app = setup().await;
    app.register("ken@example.com").await;

    let first = app.login("ken@example.com").await;
    let second = app.login("ken@example.com").await;
    let third = app.login("ken@example.com").await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout-all")
                .header("authorization", format!("Bearer {}", third.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(has_cleared_cookie(&set_cookies(&response), "refresh_token"));
    assert_eq!(body_json(response).await["revoked_count"], 3);

    for login in [&first, &second, &third] {
        let refresh = app.refresh(&login.refresh_token).await;
        assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(refresh).await["reason"], "inactive_token");
    }
}

#[tokio::test]
async fn test_logout_all_requires_authentication() {
    let app = setup().await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout-all")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["reason"], "not_authenticated");
}

#[tokio::test]
async fn test_list_and_revoke_own_tokens() {
    let app = setup().await;
    app.register("leo@example.com").await;
    let first = app.login("leo@example.com").await;
    let second = app.login("leo@example.com").await;

    let response = app.get_with_bearer("/api/tokens", &second.access_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let tokens = body["tokens"].as_array().unwrap();
    assert_eq!(tokens.len(), 2);
    assert!(tokens[0].get("token_hash").is_none());
    assert_eq!(tokens[0]["user_agent"], "integration-test/1.0");

    let first_id = app
        .db
        .refresh_tokens()
        .find_by_hash(&fingerprint(&first.refresh_token))
        .await
        .unwrap()
        .unwrap()
        .id;

    let revoke = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/tokens/{}", first_id))
                .header("authorization", format!("Bearer {}", second.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(revoke.status(), StatusCode::OK);
    assert_eq!(body_json(revoke).await["revoked"], true);

    let refresh = app.refresh(&first.refresh_token).await;
    assert_eq!(body_json(refresh).await["reason"], "inactive_token");
    assert_eq!(app.refresh(&second.refresh_token).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cannot_revoke_other_users_token() {
    let app = setup().await;
    app.register("mallory@example.com").await;
    app.register("nina@example.com").await;
    let mallory = app.login("mallory@example.com").await;
    let nina = app.login("nina@example.com").await;

    let nina_id = app
        .db
        .refresh_tokens()
        .find_by_hash(&fingerprint(&nina.refresh_token))
        .await
        .unwrap()
        .unwrap()
        .id;

    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/tokens/{}", nina_id))
                .header("authorization", format!("Bearer {}", mallory.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["revoked"], false);

    assert_eq!(app.refresh(&nina.refresh_token).await.status(), StatusCode::OK);
}
