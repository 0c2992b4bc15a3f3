//! Authentication module: hashing, token codec, revocation and the request gate

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod revocation;

pub use jwt::{Claims, JwtService, TokenError, TokenKind};
pub use middleware::{
    bearer_token, extract_token, jwt_auth_middleware, session_auth_middleware, AuthContext,
    TokenPolicy,
};
pub use password::PasswordHasher;
pub use revocation::RevocationRegistry;
