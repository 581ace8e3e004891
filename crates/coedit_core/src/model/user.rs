//! User domain model.
//!
//! # Invariants
//! - `email` is the unique external key and is stored trimmed.
//! - Users are immutable after creation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a user.
pub type UserId = Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+$").expect("valid email regex"));

/// Validation failures for user records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    /// Email is blank or does not look like `local@domain`.
    InvalidEmail(String),
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail(value) => write!(f, "invalid email: `{value}`"),
        }
    }
}

impl Error for UserValidationError {}

/// Identity allowed to author, co-author and lock articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Optional display name; blank input is stored as `None`.
    pub name: Option<String>,
}

impl User {
    /// Creates a user with a generated id and normalized fields.
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self::with_id(Uuid::new_v4(), email, name)
    }

    pub fn with_id(id: UserId, email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id,
            email: normalize_email(&email.into()),
            name: name
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        }
    }

    /// Checks the record before it is written.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        if !EMAIL_RE.is_match(&self.email) {
            return Err(UserValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

/// Normalizes an email used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}
