//! 用户资料的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    handlers::ValidatedJson,
    middleware::AppState,
    models::user::{ChangePasswordRequest, UpdateProfileRequest, UserResponse},
};
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// 当前用户资料（直接取自令牌中的身份信息）
pub async fn get_profile(auth_context: AuthContext) -> Json<UserResponse> {
    Json(UserResponse {
        user_id: auth_context.user_id,
        email: auth_context.email,
        username: auth_context.username,
        fullname: auth_context.fullname,
        avatar: auth_context.avatar,
    })
}

/// 修改资料
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .accounts
        .update_profile(auth_context.user_id, req)
        .await?;

    Ok(Json(json!({"message": "Profile updated successfully"})))
}

/// 修改密码
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .accounts
        .change_password(auth_context.user_id, req)
        .await?;

    Ok(Json(json!({"message": "Password changed successfully"})))
}

/// 注销账户
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    state.accounts.delete_account(auth_context.user_id).await?;

    Ok(Json(json!({"message": "Account deleted successfully"})))
}
