//! 账户服务：注册、邮箱检查、资料修改、密码修改、注销账户

use crate::{
    auth::password::PasswordHasher,
    error::AppError,
    models::user::{
        default_avatar_url, ChangePasswordRequest, NewIdentity, RegisterRequest, RegisterResponse,
        UpdateProfileRequest,
    },
    repository::CredentialStore,
    services::SessionManager,
};
use std::sync::Arc;

pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    sessions: Arc<SessionManager>,
    password_min_length: usize,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        sessions: Arc<SessionManager>,
        password_min_length: usize,
    ) -> Self {
        Self {
            store,
            sessions,
            password_min_length,
        }
    }

    /// 用户注册
    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, AppError> {
        PasswordHasher::validate_password_policy(&req.password, self.password_min_length)?;

        let email = req.email.trim().to_lowercase();

        if self.store.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        if self.store.username_exists(&req.username).await? {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let avatar = match req.avatar.filter(|a| !a.trim().is_empty()) {
            Some(avatar) => avatar,
            None => default_avatar_url(&req.fullname),
        };

        let password_hash = self.sessions.hasher().hash_blocking(req.password).await?;

        let user_id = self
            .store
            .create(&NewIdentity {
                email,
                username: req.username,
                fullname: req.fullname,
                avatar: avatar.clone(),
                password_hash,
            })
            .await?;

        metrics::counter!("auth_registrations_total").increment(1);
        tracing::info!(user_id, "User registered");

        Ok(RegisterResponse {
            message: "User registered successfully",
            user_id,
            avatar,
        })
    }

    pub async fn is_email_registered(&self, email: &str) -> Result<bool, AppError> {
        self.store.email_exists(&email.trim().to_lowercase()).await
    }

    /// 修改资料
    ///
    /// Tokens already issued keep the old profile fields until they expire.
    pub async fn update_profile(&self, user_id: i64, req: UpdateProfileRequest) -> Result<(), AppError> {
        self.store
            .update_profile(user_id, &req.fullname, &req.username, &req.avatar)
            .await?;

        tracing::info!(user_id, "Profile updated");
        Ok(())
    }

    /// 修改密码，并撤销该用户的全部已签发令牌
    pub async fn change_password(&self, user_id: i64, req: ChangePasswordRequest) -> Result<(), AppError> {
        PasswordHasher::validate_password_policy(&req.new_password, self.password_min_length)?;

        let identity = self.store.find_by_id(user_id).await?.ok_or(AppError::Unauthorized)?;

        let hasher = self.sessions.hasher();
        if !hasher
            .verify_blocking(req.current_password, identity.password_hash)
            .await?
        {
            return Err(AppError::InvalidCredentials);
        }

        let new_hash = hasher.hash_blocking(req.new_password).await?;
        self.store.update_password(user_id, &new_hash).await?;
        self.sessions.revoke_subject(user_id).await;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// 注销账户，并撤销该用户的全部已签发令牌
    pub async fn delete_account(&self, user_id: i64) -> Result<(), AppError> {
        self.store.delete(user_id).await?;
        self.sessions.revoke_subject(user_id).await;

        tracing::info!(user_id, "Account deleted");
        Ok(())
    }
}
