//! 会话服务：登录、刷新、登出与令牌校验
//!
//! Token lifecycle: `Issued -> Valid -> (Expired | Revoked)`. Tokens are
//! self-contained; the only server-side state is the revocation registry
//! owned by this manager.

use crate::{
    auth::{
        jwt::{Claims, JwtService, TokenKind},
        middleware::{bearer_token, AuthContext, TokenPolicy},
        password::PasswordHasher,
        revocation::RevocationRegistry,
    },
    config::AppConfig,
    error::AppError,
    models::auth::{LoginResponse, RefreshResponse},
    repository::CredentialStore,
};
use chrono::Utc;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;

pub const TOKEN_TYPE: &str = "Bearer";

/// Token lifetimes and refresh policy
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Single-use refresh tokens: each refresh revokes the presented token
    /// and hands out a new one
    pub rotate_refresh_tokens: bool,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            access_ttl: Duration::from_secs(config.security.access_token_exp_secs),
            refresh_ttl: Duration::from_secs(config.security.refresh_token_exp_secs),
            rotate_refresh_tokens: config.security.rotate_refresh_tokens,
        }
    }
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    jwt: Arc<JwtService>,
    hasher: PasswordHasher,
    registry: RevocationRegistry,
    settings: SessionSettings,
    /// Verified against when the email is unknown so both failure paths cost the same
    dummy_hash: OnceCell<String>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        jwt: Arc<JwtService>,
        hasher: PasswordHasher,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            jwt,
            hasher,
            registry: RevocationRegistry::new(),
            settings,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn from_config(config: &AppConfig, store: Arc<dyn CredentialStore>) -> Result<Self, AppError> {
        Ok(Self::new(
            store,
            Arc::new(JwtService::from_config(config)?),
            PasswordHasher::new(),
            SessionSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub fn registry(&self) -> &RevocationRegistry {
        &self.registry
    }

    /// 用户登录
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AppError> {
        let candidate = match self.store.find_by_email(&email.trim().to_lowercase()).await? {
            // 先取纪元再按 id 重读哈希：修改密码先写哈希后递增纪元
            Some(found) => {
                let epoch = self.registry.subject_epoch(found.id).await;
                self.store
                    .find_by_id(found.id)
                    .await?
                    .map(|identity| (identity, epoch))
            }
            None => None,
        };

        let stored_hash = match &candidate {
            Some((identity, _)) => identity.password_hash.clone(),
            None => self.dummy_hash().await?,
        };
        let verified = self
            .hasher
            .verify_blocking(password.to_string(), stored_hash)
            .await?;

        // 不区分 "邮箱不存在" 与 "密码错误"
        let (identity, epoch) = match candidate {
            Some(candidate) if verified => candidate,
            _ => {
                metrics::counter!("auth_login_failures_total").increment(1);
                tracing::info!("Login rejected: invalid credentials");
                return Err(AppError::InvalidCredentials);
            }
        };

        let token = self
            .jwt
            .issue(&identity, TokenKind::Access, self.settings.access_ttl, epoch)?;
        let refresh_token = self
            .jwt
            .issue(&identity, TokenKind::Refresh, self.settings.refresh_ttl, epoch)?;

        metrics::counter!("auth_logins_total").increment(1);
        tracing::info!(user_id = identity.id, "User logged in");

        Ok(LoginResponse {
            token,
            refresh_token,
            expires_in: self.settings.access_ttl.as_secs(),
            token_type: TOKEN_TYPE,
        })
    }

    /// 刷新令牌
    ///
    /// Every failure collapses to `InvalidRefreshToken`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AppError> {
        let claims = self
            .jwt
            .verify_kind(refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                tracing::debug!(reason = %e, "Refresh token rejected");
                AppError::InvalidRefreshToken
            })?;

        if self.is_revoked(refresh_token, &claims).await {
            tracing::debug!("Refresh token already revoked");
            return Err(AppError::InvalidRefreshToken);
        }

        let new_refresh_token = if self.settings.rotate_refresh_tokens {
            // 并发刷新时只有一个请求能消费该令牌
            if !self.registry.revoke_if_absent(refresh_token, claims.exp).await {
                return Err(AppError::InvalidRefreshToken);
            }
            // 轮换不延长会话：新刷新令牌沿用原过期时间
            Some(self.jwt.reissue_until(&claims, TokenKind::Refresh, claims.exp)?)
        } else {
            None
        };

        let access_token = self
            .jwt
            .reissue(&claims, TokenKind::Access, self.settings.access_ttl)?;

        tracing::info!(user_id = %claims.sub, rotated = new_refresh_token.is_some(), "Access token refreshed");

        Ok(RefreshResponse {
            access_token,
            refresh_token: new_refresh_token,
            expires_in: self.settings.access_ttl.as_secs(),
            token_type: TOKEN_TYPE,
        })
    }

    /// 登出（撤销请求携带的令牌）
    ///
    /// Takes the raw `Authorization` header value. The token is revoked
    /// without checking its signature or expiry; revoking twice is a no-op.
    pub async fn logout(&self, authorization: Option<&str>) -> Result<(), AppError> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(AppError::MissingHeader)?;

        // 已知令牌在自身过期后即可从撤销表中清除；无法解析的令牌按刷新令牌寿命保留
        let expires_at = match self.jwt.verify(token) {
            Ok(claims) => claims.exp,
            Err(_) => Utc::now().timestamp() + self.settings.refresh_ttl.as_secs() as i64,
        };
        self.registry.revoke(token, expires_at).await;

        metrics::counter!("auth_logouts_total").increment(1);
        tracing::info!("Token revoked on logout");
        Ok(())
    }

    /// 撤销某个用户的全部已签发令牌
    pub async fn revoke_subject(&self, user_id: i64) {
        let epoch = self.registry.bump_subject(user_id).await;
        tracing::info!(user_id, epoch, "All tokens of subject revoked");
    }

    /// Verify a bearer token and build the request identity
    pub async fn authenticate(&self, token: &str, policy: TokenPolicy) -> Result<AuthContext, AppError> {
        let claims = self.jwt.verify(token)?;

        if !policy.allows(claims.kind) {
            return Err(AppError::Unauthorized);
        }

        if self.is_revoked(token, &claims).await {
            return Err(AppError::Unauthorized);
        }

        Ok(AuthContext {
            user_id: claims.subject_id()?,
            email: claims.email,
            username: claims.username,
            fullname: claims.fullname,
            avatar: claims.avatar,
            kind: claims.kind,
            token: token.to_string(),
        })
    }

    async fn is_revoked(&self, token: &str, claims: &Claims) -> bool {
        if self.registry.is_revoked(token).await {
            return true;
        }
        match claims.subject_id() {
            Ok(user_id) => self.registry.is_subject_revoked(user_id, claims.epoch).await,
            Err(_) => true,
        }
    }

    /// 清理已自然过期的撤销记录
    pub async fn purge_revocations(&self) -> usize {
        let purged = self.registry.purge_expired(Utc::now().timestamp()).await;
        if purged > 0 {
            tracing::debug!(purged, "Expired revocation entries purged");
        }
        purged
    }

    async fn dummy_hash(&self) -> Result<String, AppError> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.clone());
        }
        let hash = self
            .hasher
            .hash_blocking("timing-equalizer-password".to_string())
            .await?;
        Ok(self.dummy_hash.get_or_init(|| hash).clone())
    }
}

/// 周期性清理撤销表
pub fn spawn_revocation_sweeper(
    sessions: Arc<SessionManager>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sessions.purge_revocations().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::user::NewIdentity, repository::InMemoryCredentialStore};

    const SECRET: &[u8] = b"test_secret_key_32_characters_long!";

    fn settings(rotate: bool) -> SessionSettings {
        SessionSettings {
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(86400),
            rotate_refresh_tokens: rotate,
        }
    }

    async fn manager_with_user(rotate: bool) -> (SessionManager, i64) {
        let hasher = PasswordHasher::with_params(1024, 1, 1).unwrap();
        let store = Arc::new(InMemoryCredentialStore::new());
        let id = store
            .create(&NewIdentity {
                email: "a@b.com".to_string(),
                username: "alice".to_string(),
                fullname: "Alice Baker".to_string(),
                avatar: "https://cdn.example.com/a.png".to_string(),
                password_hash: hasher.hash("secret1").unwrap(),
            })
            .await
            .unwrap();

        let manager = SessionManager::new(store, Arc::new(JwtService::new(SECRET)), hasher, settings(rotate));
        (manager, id)
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    #[tokio::test]
    async fn test_login_then_authenticate() {
        let (manager, id) = manager_with_user(true).await;

        let login = manager.login("a@b.com", "secret1").await.unwrap();
        assert_eq!(login.token_type, "Bearer");
        assert_eq!(login.expires_in, 900);

        let ctx = manager
            .authenticate(&login.token, TokenPolicy::AccessOnly)
            .await
            .unwrap();
        assert_eq!(ctx.user_id, id);
        assert_eq!(ctx.email, "a@b.com");
        assert_eq!(ctx.username, "alice");
        assert_eq!(ctx.fullname, "Alice Baker");
    }

    #[tokio::test]
    async fn test_login_token_ttl_matches_config() {
        let (manager, _) = manager_with_user(true).await;
        let jwt = JwtService::new(SECRET);

        let login = manager.login("a@b.com", "secret1").await.unwrap();
        let claims = jwt.verify(&login.token).unwrap();
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.exp - claims.iat, 900);

        let refresh = jwt.verify(&login.refresh_token).unwrap();
        assert_eq!(refresh.kind, TokenKind::Refresh);
        assert_eq!(refresh.exp - refresh.iat, 86400);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (manager, _) = manager_with_user(true).await;

        let wrong_password = manager.login("a@b.com", "wrong-password").await.unwrap_err();
        let unknown_email = manager.login("nobody@b.com", "secret1").await.unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
        assert_eq!(wrong_password.user_message(), unknown_email.user_message());
    }

    #[tokio::test]
    async fn test_refresh_issues_new_access_token() {
        let (manager, id) = manager_with_user(false).await;
        let login = manager.login("a@b.com", "secret1").await.unwrap();

        let refreshed = manager.refresh(&login.refresh_token).await.unwrap();
        assert!(refreshed.refresh_token.is_none());

        let ctx = manager
            .authenticate(&refreshed.access_token, TokenPolicy::AccessOnly)
            .await
            .unwrap();
        assert_eq!(ctx.user_id, id);

        // reusable until expiry when rotation is off
        assert!(manager.refresh(&login.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rotation_is_single_use() {
        let (manager, _) = manager_with_user(true).await;
        let login = manager.login("a@b.com", "secret1").await.unwrap();

        let first = manager.refresh(&login.refresh_token).await.unwrap();
        let rotated = first.refresh_token.unwrap();

        assert!(matches!(
            manager.refresh(&login.refresh_token).await,
            Err(AppError::InvalidRefreshToken)
        ));
        assert!(manager.refresh(&rotated).await.is_ok());
    }

    #[tokio::test]
    async fn test_rotation_does_not_extend_session() {
        let (manager, _) = manager_with_user(true).await;
        let jwt = JwtService::new(SECRET);
        let login = manager.login("a@b.com", "secret1").await.unwrap();
        let original = jwt.verify(&login.refresh_token).unwrap();

        let mut current = login.refresh_token;
        for _ in 0..3 {
            current = manager.refresh(&current).await.unwrap().refresh_token.unwrap();
        }

        assert_eq!(jwt.verify(&current).unwrap().exp, original.exp);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_expired_token() {
        let (manager, _) = manager_with_user(true).await;
        let jwt = JwtService::new(SECRET);
        let login = manager.login("a@b.com", "secret1").await.unwrap();

        let mut claims = jwt.verify(&login.token).unwrap();
        claims.iat -= 3600;
        claims.exp = Utc::now().timestamp() - 60;
        let expired = jwt.sign(&claims).unwrap();

        assert!(matches!(
            manager.authenticate(&expired, TokenPolicy::AccessOnly).await,
            Err(AppError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_foreign_expired_and_access_tokens() {
        let (manager, _) = manager_with_user(true).await;
        let login = manager.login("a@b.com", "secret1").await.unwrap();

        let foreign = JwtService::new(b"another_secret_key_also_32_chars_long!");
        let claims = JwtService::new(SECRET).verify(&login.refresh_token).unwrap();
        let forged = foreign.sign(&claims).unwrap();
        assert!(matches!(manager.refresh(&forged).await, Err(AppError::InvalidRefreshToken)));

        let mut expired_claims = claims.clone();
        expired_claims.iat -= 200_000;
        expired_claims.exp -= 200_000;
        let expired = JwtService::new(SECRET).sign(&expired_claims).unwrap();
        assert!(matches!(manager.refresh(&expired).await, Err(AppError::InvalidRefreshToken)));

        assert!(matches!(manager.refresh(&login.token).await, Err(AppError::InvalidRefreshToken)));
        assert!(matches!(manager.refresh("garbage").await, Err(AppError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let (manager, _) = manager_with_user(true).await;
        let login = manager.login("a@b.com", "secret1").await.unwrap();

        manager.logout(Some(bearer(&login.token).as_str())).await.unwrap();
        manager.logout(Some(bearer(&login.token).as_str())).await.unwrap();

        assert_eq!(manager.registry().len().await, 1);
        assert!(matches!(
            manager.authenticate(&login.token, TokenPolicy::AccessOnly).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_logout_of_refresh_token_blocks_refresh() {
        let (manager, _) = manager_with_user(false).await;
        let login = manager.login("a@b.com", "secret1").await.unwrap();

        manager.logout(Some(bearer(&login.refresh_token).as_str())).await.unwrap();

        assert!(matches!(
            manager.refresh(&login.refresh_token).await,
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_requires_header() {
        let (manager, _) = manager_with_user(true).await;

        assert!(matches!(manager.logout(None).await, Err(AppError::MissingHeader)));
        assert!(matches!(manager.logout(Some("Bearer ")).await, Err(AppError::MissingHeader)));
        assert!(matches!(manager.logout(Some("Token abc")).await, Err(AppError::MissingHeader)));

        // malformed strings are revoked harmlessly
        manager.logout(Some("Bearer not-a-jwt")).await.unwrap();
        assert!(manager.registry().is_revoked("not-a-jwt").await);
    }

    #[tokio::test]
    async fn test_authenticate_policy() {
        let (manager, _) = manager_with_user(true).await;
        let login = manager.login("a@b.com", "secret1").await.unwrap();

        assert!(matches!(
            manager.authenticate(&login.refresh_token, TokenPolicy::AccessOnly).await,
            Err(AppError::Unauthorized)
        ));
        assert!(manager
            .authenticate(&login.refresh_token, TokenPolicy::AnyKind)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_revoke_subject_invalidates_outstanding_tokens() {
        let (manager, id) = manager_with_user(false).await;
        let before = manager.login("a@b.com", "secret1").await.unwrap();

        manager.revoke_subject(id).await;

        assert!(manager.authenticate(&before.token, TokenPolicy::AccessOnly).await.is_err());
        assert!(matches!(
            manager.refresh(&before.refresh_token).await,
            Err(AppError::InvalidRefreshToken)
        ));

        let after = manager.login("a@b.com", "secret1").await.unwrap();
        assert!(manager.authenticate(&after.token, TokenPolicy::AccessOnly).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_revocation_sweeper_purges_expired_entries() {
        let (manager, _) = manager_with_user(true).await;
        let manager = Arc::new(manager);
        let now = Utc::now().timestamp();

        manager.registry().revoke("stale-token", now - 10).await;
        manager.registry().revoke("live-token", now + 3600).await;

        let sweeper = spawn_revocation_sweeper(manager.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(!manager.registry().is_revoked("stale-token").await);
        assert!(manager.registry().is_revoked("live-token").await);
        assert_eq!(manager.registry().len().await, 1);

        sweeper.abort();
    }

    #[tokio::test]
    async fn test_purge_keeps_live_revocations() {
        let (manager, _) = manager_with_user(true).await;
        let login = manager.login("a@b.com", "secret1").await.unwrap();

        manager.logout(Some(bearer(&login.token).as_str())).await.unwrap();
        assert_eq!(manager.purge_revocations().await, 0);
        assert!(manager.registry().is_revoked(&login.token).await);
    }
}
