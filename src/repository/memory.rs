//! In-memory credential store for tests and database-less local runs

use crate::{
    error::AppError,
    models::user::{Identity, NewIdentity},
    repository::user_repo::CredentialStore,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<i64, Identity>,
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().any(|u| u.email == email))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().any(|u| u.username == username))
    }

    async fn create(&self, user: &NewIdentity) -> Result<i64, AppError> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.users.insert(
            id,
            Identity {
                id,
                email: user.email.clone(),
                username: user.username.clone(),
                fullname: user.fullname.clone(),
                avatar: user.avatar.clone(),
                password_hash: user.password_hash.clone(),
            },
        );

        Ok(id)
    }

    async fn update_profile(
        &self,
        id: i64,
        fullname: &str,
        username: &str,
        avatar: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.id != id && u.username == username) {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }

        let user = inner.users.get_mut(&id).ok_or(AppError::NotFound)?;
        user.fullname = fullname.to_string();
        user.username = username.to_string();
        user.avatar = avatar.to_string();
        Ok(())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let user = inner.users.get_mut(&id).ok_or(AppError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.users.remove(&id).map(|_| ()).ok_or(AppError::NotFound)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
