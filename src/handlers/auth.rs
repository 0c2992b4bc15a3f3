//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    handlers::ValidatedJson,
    middleware::AppState,
    models::{auth::*, user::RegisterRequest},
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.accounts.register(req).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.sessions.login(&req.email, &req.password).await?;

    Ok(Json(response))
}

/// 检查邮箱是否已注册
pub async fn check_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CheckEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    let is_registered = state.accounts.is_email_registered(&req.email).await?;

    Ok(Json(CheckEmailResponse { is_registered }))
}

/// 刷新令牌（路由本身需要有效的 bearer 令牌）
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.sessions.refresh(&req.refresh_token).await?;

    Ok(Json(response))
}

/// 登出
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    state.sessions.logout(authorization).await?;

    Ok(Json(json!({"message": "Logged out successfully"})))
}
