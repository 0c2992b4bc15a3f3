//! User repository (数据库访问层)

use crate::{
    error::AppError,
    models::user::{Identity, NewIdentity},
};
use async_trait::async_trait;
use sqlx::PgPool;

/// Credential store contract used by the session manager and account handlers
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AppError>;

    async fn username_exists(&self, username: &str) -> Result<bool, AppError>;

    /// Insert a user, returning the new id. Duplicate email or username is a `Conflict`.
    async fn create(&self, user: &NewIdentity) -> Result<i64, AppError>;

    /// Update profile fields. Duplicate username is a `Conflict`, unknown id `NotFound`.
    async fn update_profile(
        &self,
        id: i64,
        fullname: &str,
        username: &str,
        avatar: &str,
    ) -> Result<(), AppError>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    /// Readiness probe
    async fn health_check(&self) -> Result<(), AppError>;
}

pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 将唯一约束冲突映射为 Conflict
    fn map_unique_violation(e: sqlx::Error) -> AppError {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return match db_err.constraint() {
                    Some(c) if c.contains("email") => {
                        AppError::Conflict("Email already registered".to_string())
                    }
                    _ => AppError::Conflict("Username is already taken".to_string()),
                };
            }
        }
        AppError::Database(e)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let user = sqlx::query_as::<_, Identity>(
            "SELECT id, email, username, fullname, avatar, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError> {
        let user = sqlx::query_as::<_, Identity>(
            "SELECT id, email, username, fullname, avatar, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.db)
                .await?;

        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.db)
                .await?;

        Ok(exists)
    }

    async fn create(&self, user: &NewIdentity) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, fullname, email, avatar, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.fullname)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(Self::map_unique_violation)?;

        Ok(id)
    }

    async fn update_profile(
        &self,
        id: i64,
        fullname: &str,
        username: &str,
        avatar: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET fullname = $1, username = $2, avatar = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(fullname)
        .bind(username)
        .bind(avatar)
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(Self::map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
