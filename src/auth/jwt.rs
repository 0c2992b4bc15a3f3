//! JWT token generation and validation
//! Implements access token + refresh token pattern over HS256

use crate::{config::AppConfig, error::AppError, models::user::Identity};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Token kind carried in the claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims shared by issuance and verification
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    pub email: String,

    pub username: String,

    pub fullname: String,

    pub avatar: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    pub kind: TokenKind,

    /// Subject revocation epoch at issue time
    #[serde(default)]
    pub epoch: u64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl Claims {
    /// Numeric user id carried in `sub`
    pub fn subject_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Malformed)
    }
}

/// Verification failures, checked in the order parse, signature, expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token malformed")]
    Malformed,

    #[error("token signature mismatch")]
    InvalidSignature,

    #[error("token expired")]
    Expired,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let secret = config.security.jwt_secret.expose_secret();

        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Ok(Self::new(secret.as_bytes()))
    }

    /// Create JWT service from raw secret bytes
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a token for `identity` valid for `ttl`
    pub fn issue(
        &self,
        identity: &Identity,
        kind: TokenKind,
        ttl: Duration,
        epoch: u64,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            username: identity.username.clone(),
            fullname: identity.fullname.clone(),
            avatar: identity.avatar.clone(),
            iat: 0,
            exp: 0,
            kind,
            epoch,
            jti: String::new(),
        };

        self.sign(&Self::stamp(claims, kind, ttl))
    }

    /// Sign a fresh token carrying the same subject as `claims`
    pub fn reissue(&self, claims: &Claims, kind: TokenKind, ttl: Duration) -> Result<String, AppError> {
        self.sign(&Self::stamp(claims.clone(), kind, ttl))
    }

    /// Sign a fresh token for the same subject that expires at `exp` (unix seconds)
    pub fn reissue_until(&self, claims: &Claims, kind: TokenKind, exp: i64) -> Result<String, AppError> {
        let mut claims = Self::stamp(claims.clone(), kind, Duration::ZERO);
        claims.exp = exp.max(claims.iat);
        self.sign(&claims)
    }

    fn stamp(mut claims: Claims, kind: TokenKind, ttl: Duration) -> Claims {
        let now = Utc::now().timestamp();
        claims.iat = now;
        claims.exp = now + ttl.as_secs() as i64;
        claims.kind = kind;
        claims.jti = Uuid::new_v4().to_string();
        claims
    }

    /// Sign prepared claims
    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {:?}", e);
            AppError::Internal(format!("Failed to encode token: {}", e))
        })
    }

    /// Validate and decode token
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        TokenError::InvalidSignature
                    }
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                }
            })
    }

    /// Validate a token and require a specific kind
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;

        if claims.kind != kind {
            tracing::debug!(expected = ?kind, actual = ?claims.kind, "Token kind mismatch");
            return Err(TokenError::Malformed);
        }

        Ok(claims)
    }
}
