//! 业务服务层

pub mod account_service;
pub mod session_service;

pub use account_service::AccountService;
pub use session_service::{spawn_revocation_sweeper, SessionManager, SessionSettings};
