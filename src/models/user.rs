//! User models

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Stored user record. The password hash never leaves the
/// credential store / session manager boundary.
#[derive(Clone, sqlx::FromRow)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
    pub password_hash: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("fullname", &self.fullname)
            .field("avatar", &self.avatar)
            .field("password_hash", &"[redacted]")
            .finish()
    }
}

/// Fields needed to create a user
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
    pub password_hash: String,
}

/// Public projection of a user
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 1))]
    pub fullname: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[validate(url)]
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user_id: i64,
    pub avatar: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1))]
    pub fullname: String,
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(url)]
    pub avatar: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8))]
    pub new_password: String,
}

/// Generated avatar for users who did not supply one,
/// built from the first and last word of the full name
pub fn default_avatar_url(fullname: &str) -> String {
    let parts: Vec<&str> = fullname.split_whitespace().collect();

    let mut url = String::from("https://avatar.iran.liara.run/username?username=");
    if let Some(first) = parts.first() {
        url.push_str(first);
    }
    if parts.len() > 1 {
        url.push('+');
        url.push_str(parts[parts.len() - 1]);
    }
    url
}
