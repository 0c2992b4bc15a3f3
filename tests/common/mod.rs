//! 测试公共模块
//! 提供测试配置、应用状态和请求辅助函数

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use recipe_api::{
    auth::{jwt::JwtService, password::PasswordHasher},
    config::{AppConfig, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig},
    middleware::AppState,
    repository::{CredentialStore, InMemoryCredentialStore},
    services::{SessionManager, SessionSettings},
};
use secrecy::Secret;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
            body_limit_bytes: 64 * 1024,
        },
        database: DatabaseConfig {
            url: None,
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 300,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new(TEST_SECRET.to_string()),
            access_token_exp_secs: 900,
            refresh_token_exp_secs: 86400,
            rotate_refresh_tokens: true,
            revocation_sweep_interval_secs: 60,
            password_min_length: 6,
            allowed_origins: vec![],
        },
    }
}

/// 低成本哈希参数，加快测试
pub fn test_hasher() -> PasswordHasher {
    PasswordHasher::with_params(1024, 1, 1).expect("valid argon2 params")
}

/// 创建测试应用状态（内存凭据存储）
pub fn create_test_app_state(config: AppConfig) -> Arc<AppState> {
    let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
    let sessions = Arc::new(SessionManager::new(
        store.clone(),
        Arc::new(JwtService::new(TEST_SECRET.as_bytes())),
        test_hasher(),
        SessionSettings::from_config(&config),
    ));

    Arc::new(AppState::with_sessions(config, store, sessions))
}

pub fn create_test_app() -> (Arc<AppState>, Router) {
    let state = create_test_app_state(create_test_config());
    let app = recipe_api::routes::create_router(state.clone());
    (state, app)
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// 发送 JSON 请求，可选携带 bearer 令牌
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// 注册测试用户，返回用户 ID
pub async fn register_user(app: &Router, email: &str, username: &str, password: &str) -> i64 {
    let (status, json) = send(
        app,
        "POST",
        "/v1/auth/register",
        None,
        Some(serde_json::json!({
            "username": username,
            "fullname": "Test User",
            "email": email,
            "password": password,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "register failed: {}", json);
    json["user_id"].as_i64().unwrap()
}

/// 登录，返回 (访问令牌, 刷新令牌)
pub async fn login(app: &Router, email: &str, password: &str) -> (String, String) {
    let (status, json) = send(
        app,
        "POST",
        "/v1/auth/login",
        None,
        Some(serde_json::json!({"email": email, "password": password})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "login failed: {}", json);
    (
        json["token"].as_str().unwrap().to_string(),
        json["refresh_token"].as_str().unwrap().to_string(),
    )
}
