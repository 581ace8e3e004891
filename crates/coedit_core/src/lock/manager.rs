//! Pessimistic edit-lock state machine.
//!
//! # Responsibility
//! - Decide whether an actor may perform a lock operation on an article.
//! - Compute the next lock fields without touching storage.
//!
//! # Invariants
//! - At most one actor holds a non-expired lock per article.
//! - Denied operations never produce a transition.
//! - Expiry is evaluated lazily at decision time; nothing sweeps stale locks.
//! - Heartbeat and Release check the recorded holder only; an expired holder
//!   must re-acquire.

use crate::config::LockPolicy;
use crate::model::article::{Article, ArticleLock};
use crate::model::user::UserId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Operation requested by an actor against one article lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOperation {
    /// Take the lock, or refresh it when already held by the actor.
    Acquire,
    /// Refresh `last_heartbeat_at` of a lock the actor holds.
    Heartbeat,
    /// Give up a held lock without saving.
    Release,
    /// Replace content and release the lock.
    SaveAndRelease { content: String },
    /// Author-only override clearing any lock.
    ForceUnlock,
}

impl LockOperation {
    /// Stable name used in log events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Acquire => "lock_acquire",
            Self::Heartbeat => "lock_heartbeat",
            Self::Release => "lock_release",
            Self::SaveAndRelease { .. } => "article_save",
            Self::ForceUnlock => "lock_force_unlock",
        }
    }
}

/// Lock decision denials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Another actor holds a lock that has not expired.
    LockHeld { holder: UserId },
    /// The actor is not the recorded holder of a well-formed lock.
    NotLockHolder,
    /// Only the article author may force-unlock.
    NotAuthor,
}

impl Display for LockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockHeld { holder } => write!(f, "article is locked by {holder}"),
            Self::NotLockHolder => write!(f, "actor does not hold the lock"),
            Self::NotAuthor => write!(f, "only the original author can force-unlock"),
        }
    }
}

impl Error for LockError {}

/// Approved state change for one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTransition {
    /// Lock fields to write.
    pub lock: ArticleLock,
    /// Replacement content, when the operation saves.
    pub content: Option<String>,
    /// Holder recorded before the transition, expired or not.
    pub previous_holder: Option<UserId>,
}

impl LockTransition {
    /// Applies the transition to an in-memory copy of `article`.
    pub fn apply_to(&self, article: &mut Article) {
        article.lock = self.lock;
        if let Some(content) = &self.content {
            article.content = content.clone();
        }
    }
}

/// Evaluates lock operations under one expiry policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockManager {
    policy: LockPolicy,
}

impl LockManager {
    pub fn new(policy: LockPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Returns whether `lock` no longer excludes other actors at `now_ms`.
    ///
    /// An absent holder counts as expired, and so does a holder without a
    /// heartbeat timestamp (partial state fails open).
    pub fn is_expired(&self, lock: &ArticleLock, now_ms: i64) -> bool {
        if lock.lock_holder.is_none() {
            return true;
        }
        match lock.last_heartbeat_at {
            None => true,
            Some(heartbeat_at) => now_ms.saturating_sub(heartbeat_at) > self.policy.timeout_ms(),
        }
    }

    /// Holder whose lock is still live at `now_ms`.
    pub fn active_holder(&self, lock: &ArticleLock, now_ms: i64) -> Option<UserId> {
        if self.is_expired(lock, now_ms) {
            None
        } else {
            lock.lock_holder
        }
    }

    /// Instant after which the current lock is expired, if it is live now.
    pub fn expires_at(&self, lock: &ArticleLock, now_ms: i64) -> Option<i64> {
        self.active_holder(lock, now_ms)?;
        lock.last_heartbeat_at
            .map(|heartbeat_at| heartbeat_at.saturating_add(self.policy.timeout_ms()))
    }

    /// Decides `operation` by `actor` against the current `article` state.
    pub fn evaluate(
        &self,
        article: &Article,
        actor: UserId,
        operation: &LockOperation,
        now_ms: i64,
    ) -> Result<LockTransition, LockError> {
        let current = article.lock;
        let previous_holder = current.lock_holder;

        let (lock, content) = match operation {
            LockOperation::Acquire => {
                self.ensure_not_held_by_other(&current, actor, now_ms)?;
                (ArticleLock::held_by(actor, now_ms), None)
            }
            LockOperation::Heartbeat => {
                ensure_recorded_holder(&current, actor)?;
                // A partial triple already reads as expired; only Acquire rebuilds it.
                if !current.is_consistent() {
                    return Err(LockError::NotLockHolder);
                }
                let lock = ArticleLock {
                    last_heartbeat_at: Some(now_ms),
                    ..current
                };
                (lock, None)
            }
            LockOperation::Release => {
                ensure_recorded_holder(&current, actor)?;
                (ArticleLock::unlocked(), None)
            }
            LockOperation::SaveAndRelease { content } => {
                self.ensure_not_held_by_other(&current, actor, now_ms)?;
                (ArticleLock::unlocked(), Some(content.clone()))
            }
            LockOperation::ForceUnlock => {
                if actor != article.author_id {
                    return Err(LockError::NotAuthor);
                }
                (ArticleLock::unlocked(), None)
            }
        };

        Ok(LockTransition {
            lock,
            content,
            previous_holder,
        })
    }

    fn ensure_not_held_by_other(
        &self,
        lock: &ArticleLock,
        actor: UserId,
        now_ms: i64,
    ) -> Result<(), LockError> {
        match lock.lock_holder {
            Some(holder) if holder != actor && !self.is_expired(lock, now_ms) => {
                Err(LockError::LockHeld { holder })
            }
            _ => Ok(()),
        }
    }
}

fn ensure_recorded_holder(lock: &ArticleLock, actor: UserId) -> Result<(), LockError> {
    if lock.lock_holder == Some(actor) {
        Ok(())
    } else {
        Err(LockError::NotLockHolder)
    }
}
