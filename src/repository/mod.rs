//! 数据访问层

pub mod memory;
pub mod user_repo;

pub use memory::InMemoryCredentialStore;
pub use user_repo::{CredentialStore, PgCredentialStore};
