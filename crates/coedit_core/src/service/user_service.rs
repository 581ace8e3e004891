//! User registration use-cases.

use crate::model::user::User;
use crate::repo::user_repo::UserRepository;
use crate::repo::{RepoError, RepoResult};
use log::info;

/// Use-case service wrapper for user records.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new user; emails must be unique.
    ///
    /// Returns `DuplicateEmail` when the email is taken and `InvalidUser`
    /// when it is malformed.
    pub fn register_user(&self, email: &str, name: Option<String>) -> RepoResult<User> {
        let user = User::new(email, name);
        user.validate()?;
        if self.repo.find_user_by_email(&user.email)?.is_some() {
            return Err(RepoError::DuplicateEmail(user.email));
        }

        self.repo.create_user(&user)?;
        info!(
            "event=user_register module=service status=ok user_id={}",
            user.id
        );
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.repo.find_user_by_email(email)
    }

    pub fn list_users(&self) -> RepoResult<Vec<User>> {
        self.repo.list_users()
    }
}
