//! Article domain model.
//!
//! # Responsibility
//! - Define the shared document record and its edit-lock fields.
//! - Normalize co-author input into a stable, deduplicated list.
//!
//! # Invariants
//! - `author_id` is set at creation and never changes.
//! - `lock_holder`, `lock_acquired_at` and `last_heartbeat_at` are set
//!   together and cleared together by every write path.
//! - `co_authors` holds trimmed, non-empty, unique identities in first-seen
//!   order.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an article.
pub type ArticleId = Uuid;

/// Validation failures for article records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleValidationError {
    /// Title is blank after trim.
    BlankTitle,
    /// Co-author entry is blank, untrimmed or duplicated.
    InvalidCoAuthor(String),
    /// Lock fields are partially set.
    InconsistentLock,
}

impl Display for ArticleValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "article title must not be blank"),
            Self::InvalidCoAuthor(value) => write!(f, "invalid co-author entry: `{value}`"),
            Self::InconsistentLock => write!(
                f,
                "lock_holder, lock_acquired_at and last_heartbeat_at must be set together"
            ),
        }
    }
}

impl Error for ArticleValidationError {}

/// Edit-lock fields of one article.
///
/// The three fields are kept separate instead of folded into one
/// `Option<Lock>` because persisted rows may carry a partial triple, which the
/// expiry predicate must treat as expired rather than reject. The same struct
/// is the snapshot used as the compare-and-write precondition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLock {
    /// User currently holding the edit lock.
    pub lock_holder: Option<UserId>,
    /// Epoch milliseconds when the current lock was taken.
    pub lock_acquired_at: Option<i64>,
    /// Epoch milliseconds of the holder's latest liveness signal.
    pub last_heartbeat_at: Option<i64>,
}

impl ArticleLock {
    /// Lock state with all fields cleared.
    pub fn unlocked() -> Self {
        Self::default()
    }

    /// Fresh lock held by `holder`, acquired and heartbeated at `now_ms`.
    pub fn held_by(holder: UserId, now_ms: i64) -> Self {
        Self {
            lock_holder: Some(holder),
            lock_acquired_at: Some(now_ms),
            last_heartbeat_at: Some(now_ms),
        }
    }

    /// Returns whether any holder is recorded, regardless of expiry.
    pub fn is_held(&self) -> bool {
        self.lock_holder.is_some()
    }

    /// Returns whether the all-or-none invariant holds.
    pub fn is_consistent(&self) -> bool {
        let set = [
            self.lock_holder.is_some(),
            self.lock_acquired_at.is_some(),
            self.last_heartbeat_at.is_some(),
        ];
        set.iter().all(|value| *value) || set.iter().all(|value| !*value)
    }
}

/// Shared document owned by one author and edited under a pessimistic lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    /// Opaque body, replaced wholesale on save.
    pub content: String,
    pub author_id: UserId,
    pub co_authors: Vec<String>,
    #[serde(flatten)]
    pub lock: ArticleLock,
}

impl Article {
    /// Creates an unlocked article with a generated id.
    ///
    /// `co_authors` is normalized; see [`normalize_co_authors`].
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author_id: UserId,
        co_authors: &[String],
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into().trim().to_string(),
            content: content.into(),
            author_id,
            co_authors: normalize_co_authors(co_authors),
            lock: ArticleLock::unlocked(),
        }
    }

    /// Checks the record before it is written.
    pub fn validate(&self) -> Result<(), ArticleValidationError> {
        if self.title.trim().is_empty() {
            return Err(ArticleValidationError::BlankTitle);
        }

        let mut seen = HashSet::new();
        for entry in &self.co_authors {
            if entry.is_empty() || entry.trim() != entry || !seen.insert(entry.as_str()) {
                return Err(ArticleValidationError::InvalidCoAuthor(entry.clone()));
            }
        }

        if !self.lock.is_consistent() {
            return Err(ArticleValidationError::InconsistentLock);
        }

        Ok(())
    }
}

/// Trims entries, drops blanks and removes duplicates keeping first occurrence.
pub fn normalize_co_authors(entries: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for entry in entries {
        let trimmed = entry.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

/// Splits comma-separated co-author input and normalizes it.
pub fn parse_co_authors(raw: &str) -> Vec<String> {
    let entries: Vec<String> = raw.split(',').map(str::to_string).collect();
    normalize_co_authors(&entries)
}

/// Picks the list form when it yields entries, otherwise the comma form.
pub fn resolve_co_authors(list: &[String], comma_separated: Option<&str>) -> Vec<String> {
    let from_list = normalize_co_authors(list);
    if !from_list.is_empty() {
        return from_list;
    }
    comma_separated.map(parse_co_authors).unwrap_or_default()
}
