//! JWT 认证中间件

use crate::{auth::jwt::TokenKind, error::AppError, services::SessionManager};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
    pub kind: TokenKind,
    /// 原始 bearer 令牌，供登出使用
    pub token: String,
}

/// 网关接受的令牌种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPolicy {
    /// 普通受保护路由只接受访问令牌
    AccessOnly,
    /// 会话路由（刷新、登出）同时接受刷新令牌
    AnyKind,
}

impl TokenPolicy {
    pub fn allows(self, kind: TokenKind) -> bool {
        match self {
            TokenPolicy::AccessOnly => kind == TokenKind::Access,
            TokenPolicy::AnyKind => true,
        }
    }
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 从 Authorization 头的值中取出 bearer 令牌
pub fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 从 Authorization 头提取令牌
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

async fn authenticate_request(
    sessions: &SessionManager,
    policy: TokenPolicy,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 缺少令牌时直接拒绝，不触达解码器
    let token = extract_token(req.headers())?;

    let auth_context = sessions.authenticate(&token, policy).await.map_err(|e| {
        tracing::debug!(reason = %e, "Bearer token rejected");
        metrics::counter!("auth_gate_rejections_total").increment(1);
        AppError::Unauthorized
    })?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// JWT 认证中间件 - 仅接受访问令牌
pub async fn jwt_auth_middleware(
    State(sessions): State<Arc<SessionManager>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate_request(&sessions, TokenPolicy::AccessOnly, req, next).await
}

/// 会话路由认证中间件 - 接受访问令牌或刷新令牌
pub async fn session_auth_middleware(
    State(sessions): State<Arc<SessionManager>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate_request(&sessions, TokenPolicy::AnyKind, req, next).await
}
