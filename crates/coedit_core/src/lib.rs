//! Core domain logic for collaborative article editing.
//! This crate owns the edit-lock protocol and its persistence contract.

pub mod config;
pub mod db;
pub mod lock;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, LockPolicy, DEFAULT_LOCK_TIMEOUT_MINUTES, LOCK_TIMEOUT_ENV};
pub use lock::clock::{Clock, ManualClock, SystemClock};
pub use lock::manager::{LockError, LockManager, LockOperation, LockTransition};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::article::{
    normalize_co_authors, parse_co_authors, resolve_co_authors, Article, ArticleId, ArticleLock,
    ArticleValidationError,
};
pub use model::user::{User, UserId, UserValidationError};
pub use repo::article_repo::{
    ArticleListQuery, ArticleRepository, ArticleUpdate, SqliteArticleRepository,
};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::article_service::{
    ArticleService, ArticleServiceError, ArticleServiceResult, CreateArticleRequest,
    ForceUnlockOutcome, HeartbeatAck, LockGrant, LockStatus, MAX_WRITE_ATTEMPTS,
};
pub use service::user_service::UserService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
