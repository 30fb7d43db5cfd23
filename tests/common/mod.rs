#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use serde_json::{Value, json};
use tokenward::{
    ServerConfig,
    auth::CookiePolicy,
    create_app,
    db::Database,
    jwt::{JwtConfig, JwtSettings},
    rate_limit::RateLimitConfig,
};
use tower::ServiceExt;

pub const PASSWORD: &str = "Secret-pass1";
pub const TEST_IP: &str = "203.0.113.10";

const ACCESS_SECRET: &[u8] = b"integration-access-secret-0123456789";
const REFRESH_SECRET: &[u8] = b"integration-refresh-secret-012345678";

pub fn jwt_settings() -> JwtSettings {
    JwtSettings::new(ACCESS_SECRET, REFRESH_SECRET)
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
}

/// Cookies and tokens handed out by a successful login.
pub struct Login {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: String,
}

pub async fn setup() -> TestApp {
    TestSetup::new().build().await
}

/// Builder for test setup with various options
pub struct TestSetup {
    trust_proxy: bool,
    rate_limit: Option<RateLimitConfig>,
    production: bool,
}

impl TestSetup {
    pub fn new() -> Self {
        Self {
            trust_proxy: true,
            rate_limit: None,
            production: false,
        }
    }

    pub fn with_rate_limit(mut self, limits: RateLimitConfig) -> Self {
        self.rate_limit = Some(limits);
        self
    }

    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub async fn build(self) -> TestApp {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let jwt = jwt_settings();
        let config = ServerConfig {
            db: db.clone(),
            jwt: jwt.clone(),
            cookies: CookiePolicy::new(self.production),
            session_ttl_secs: 3600,
            trust_proxy: self.trust_proxy,
            rate_limit: self.rate_limit,
        };
        TestApp {
            app: create_app(&config),
            db,
            jwt: JwtConfig::new(&jwt),
        }
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn register(&self, email: &str) -> Response<Body> {
        self.send(json_request(
            "POST",
            "/api/auth/register",
            json!({ "email": email, "password": PASSWORD, "name": "Test User" }),
        ))
        .await
    }

    /// Log in with the shared test password. The account must already exist.
    pub async fn login(&self, email: &str) -> Login {
        let response = self
            .send(json_request(
                "POST",
                "/api/auth/login",
                json!({ "email": email, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login should succeed");

        let cookies = set_cookies(&response);
        let body = body_json(response).await;
        Login {
            access_token: body["access_token"].as_str().unwrap().to_string(),
            refresh_token: cookie_value(&cookies, "refresh_token").unwrap(),
            session_id: cookie_value(&cookies, "session_id").unwrap(),
        }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("cookie", format!("refresh_token={}", refresh_token))
                .header("x-forwarded-for", TEST_IP)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get_with_session(&self, uri: &str, session_id: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .header("cookie", format!("session_id={}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get_with_bearer(&self, uri: &str, token: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", TEST_IP)
        .header("user-agent", "integration-test/1.0")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Extract Set-Cookie headers from response
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of a cookie being set (not cleared).
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find_map(|c| {
        let value = c.strip_prefix(&prefix)?.split(';').next()?;
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Check if cookies contain a cookie being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], name: &str) -> bool {
    let prefix = format!("{}=;", name);
    cookies
        .iter()
        .any(|c| c.starts_with(&prefix) && c.contains("Max-Age=0"))
}
