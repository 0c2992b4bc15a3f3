//! HTTP 处理器模块

pub mod auth;
pub mod health;
pub mod user;

use crate::error::AppError;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// 解析并校验 JSON 请求体，失败时返回统一的 400 错误
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!(rejection = %e.body_text(), "Invalid JSON body");
            AppError::BadRequest("Invalid request body".to_string())
        })?;

        value.validate()?;

        Ok(Self(value))
    }
}
