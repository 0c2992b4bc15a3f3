//! 用户资料 API 集成测试

use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{create_test_app, login, register_user, send};

#[tokio::test]
async fn test_profile_requires_token() {
    let (_state, app) = create_test_app();

    let (status, json) = send(&app, "GET", "/v1/user/profile", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Unauthorized");
}

#[tokio::test]
async fn test_profile_rejects_refresh_token() {
    let (_state, app) = create_test_app();
    register_user(&app, "kind@example.com", "kind", "secret123").await;
    let (_token, refresh) = login(&app, "kind@example.com", "secret123").await;

    let (status, _) = send(&app, "GET", "/v1/user/profile", Some(&refresh), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_profile() {
    let (state, app) = create_test_app();
    let user_id = register_user(&app, "edit@example.com", "edit", "secret123").await;
    let (token, _) = login(&app, "edit@example.com", "secret123").await;

    let (status, json) = send(
        &app,
        "POST",
        "/v1/user/update-profile",
        Some(&token),
        Some(json!({
            "fullname": "Edited Name",
            "username": "edited",
            "avatar": "https://example.com/avatar.png",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);

    let identity = state.store.find_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(identity.fullname, "Edited Name");
    assert_eq!(identity.username, "edited");

    // 新登录签发的令牌携带新资料
    let (token, _) = login(&app, "edit@example.com", "secret123").await;
    let (_, json) = send(&app, "GET", "/v1/user/profile", Some(&token), None).await;
    assert_eq!(json["username"], "edited");
    assert_eq!(json["avatar"], "https://example.com/avatar.png");
}

#[tokio::test]
async fn test_update_profile_duplicate_username() {
    let (_state, app) = create_test_app();
    register_user(&app, "one@example.com", "one", "secret123").await;
    register_user(&app, "two@example.com", "two", "secret123").await;
    let (token, _) = login(&app, "two@example.com", "secret123").await;

    let (status, _) = send(
        &app,
        "POST",
        "/v1/user/update-profile",
        Some(&token),
        Some(json!({
            "fullname": "Two",
            "username": "one",
            "avatar": "https://example.com/two.png",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_change_password_revokes_sessions() {
    let (_state, app) = create_test_app();
    register_user(&app, "pw@example.com", "pw", "secret123").await;
    let (token, refresh) = login(&app, "pw@example.com", "secret123").await;

    let (status, json) = send(
        &app,
        "POST",
        "/v1/user/change-password",
        Some(&token),
        Some(json!({
            "current_password": "secret123",
            "new_password": "new-secret-456",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);

    // 旧令牌全部失效
    let (status, _) = send(&app, "GET", "/v1/user/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/auth/refresh-token",
        Some(&refresh),
        Some(json!({"refresh_token": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 旧密码不可用，新密码可用
    let (status, _) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": "pw@example.com", "password": "secret123"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (token, _) = login(&app, "pw@example.com", "new-secret-456").await;
    let (status, _) = send(&app, "GET", "/v1/user/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_wrong_current() {
    let (_state, app) = create_test_app();
    register_user(&app, "wrong@example.com", "wrong", "secret123").await;
    let (token, _) = login(&app, "wrong@example.com", "secret123").await;

    let (status, json) = send(
        &app,
        "POST",
        "/v1/user/change-password",
        Some(&token),
        Some(json!({
            "current_password": "not-my-password",
            "new_password": "new-secret-456",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Invalid credentials");

    // 失败的修改不影响现有会话
    let (status, _) = send(&app, "GET", "/v1/user/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_account() {
    let (state, app) = create_test_app();
    let user_id = register_user(&app, "bye@example.com", "bye", "secret123").await;
    let (token, _) = login(&app, "bye@example.com", "secret123").await;

    let (status, _) = send(&app, "POST", "/v1/user/delete-account", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    assert!(state.store.find_by_id(user_id).await.unwrap().is_none());

    let (status, _) = send(&app, "GET", "/v1/user/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(
        &app,
        "POST",
        "/v1/auth/check-email",
        None,
        Some(json!({"email": "bye@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isRegistered"], false);
}
