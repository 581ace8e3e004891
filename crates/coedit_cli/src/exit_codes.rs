//! Exit code constants for the coedit CLI.
//!
//! - 0: Success
//! - 1: User error (bad input, invalid config, duplicate registration)
//! - 2: Article or user not found
//! - 3: Lock denied (held by someone else, not holder, not author)
//! - 4: Concurrent write conflict persisted after retry

use coedit_core::{ArticleServiceError, RepoError};

pub const SUCCESS: u8 = 0;
pub const USER_ERROR: u8 = 1;
pub const NOT_FOUND: u8 = 2;
pub const LOCK_DENIED: u8 = 3;
pub const WRITE_CONFLICT: u8 = 4;

/// Maps an error chain to the process exit code.
pub fn for_error(err: &anyhow::Error) -> u8 {
    if let Some(service_err) = err.downcast_ref::<ArticleServiceError>() {
        return match service_err {
            ArticleServiceError::ArticleNotFound(_) | ArticleServiceError::UserNotFound(_) => {
                NOT_FOUND
            }
            ArticleServiceError::LockHeld { .. }
            | ArticleServiceError::NotLockHolder { .. }
            | ArticleServiceError::NotAuthor { .. } => LOCK_DENIED,
            ArticleServiceError::WriteConflict(_) => WRITE_CONFLICT,
            ArticleServiceError::Repo(repo_err) => for_repo_error(repo_err),
            ArticleServiceError::InvalidArticle(_)
            | ArticleServiceError::InconsistentState(_) => USER_ERROR,
        };
    }
    if let Some(repo_err) = err.downcast_ref::<RepoError>() {
        return for_repo_error(repo_err);
    }
    USER_ERROR
}

fn for_repo_error(err: &RepoError) -> u8 {
    match err {
        RepoError::ArticleNotFound(_) => NOT_FOUND,
        RepoError::WriteConflict(_) => WRITE_CONFLICT,
        _ => USER_ERROR,
    }
}
