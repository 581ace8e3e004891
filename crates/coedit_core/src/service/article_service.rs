//! Article use-case service.
//!
//! # Responsibility
//! - Resolve actors and articles through the record store.
//! - Delegate lock decisions to [`LockManager`] and persist approved
//!   transitions with compare-and-write.
//!
//! # Invariants
//! - Denied operations write nothing.
//! - Every write is conditioned on the lock snapshot the decision was made
//!   against; on conflict the decision is re-run once against fresh state.
//! - Log events carry ids only, never article content.

use crate::config::LockPolicy;
use crate::lock::clock::Clock;
use crate::lock::manager::{LockError, LockManager, LockOperation};
use crate::model::article::{Article, ArticleId, ArticleValidationError};
use crate::model::user::{User, UserId};
use crate::repo::article_repo::{ArticleListQuery, ArticleRepository, ArticleUpdate};
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Evaluate-and-write attempts per operation before surfacing a conflict.
pub const MAX_WRITE_ATTEMPTS: u32 = 2;

/// Service error for article and lock use-cases.
#[derive(Debug)]
pub enum ArticleServiceError {
    ArticleNotFound(ArticleId),
    /// No user is registered under the given email.
    UserNotFound(String),
    /// Another user holds a live lock.
    LockHeld { article_id: ArticleId, holder: User },
    /// Caller's assumed lock is not the recorded one; re-acquire.
    NotLockHolder { article_id: ArticleId },
    /// Only the original author may force-unlock.
    NotAuthor { article_id: ArticleId },
    /// Concurrent modification persisted after retrying.
    WriteConflict(ArticleId),
    InvalidArticle(ArticleValidationError),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl ArticleServiceError {
    /// Returns whether retrying later may succeed without caller changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockHeld { .. } | Self::WriteConflict(_))
    }
}

impl Display for ArticleServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArticleNotFound(id) => write!(f, "article not found: {id}"),
            Self::UserNotFound(email) => write!(f, "user not found: {email}"),
            Self::LockHeld { holder, .. } => write!(f, "article locked by {}", holder.email),
            Self::NotLockHolder { article_id } => {
                write!(f, "you do not hold the lock on article {article_id}")
            }
            Self::NotAuthor { article_id } => write!(
                f,
                "only the original author can force-unlock article {article_id}"
            ),
            Self::WriteConflict(id) => write!(f, "article {id} was modified concurrently"),
            Self::InvalidArticle(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent article state: {details}"),
        }
    }
}

impl Error for ArticleServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidArticle(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ArticleServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ArticleNotFound(id) => Self::ArticleNotFound(id),
            RepoError::WriteConflict(id) => Self::WriteConflict(id),
            RepoError::InvalidArticle(err) => Self::InvalidArticle(err),
            other => Self::Repo(other),
        }
    }
}

pub type ArticleServiceResult<T> = Result<T, ArticleServiceError>;

/// Input for creating an article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    /// Email of an existing user who becomes the immutable author.
    pub author_email: String,
    pub co_authors: Vec<String>,
}

/// Successful acquire result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockGrant {
    pub article_id: ArticleId,
    pub holder: User,
    pub acquired_at: i64,
    pub last_heartbeat_at: i64,
    pub expires_at: i64,
}

/// Successful heartbeat result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartbeatAck {
    pub article_id: ArticleId,
    pub last_heartbeat_at: i64,
    pub expires_at: i64,
}

/// Force-unlock result; `previous_holder` lets the caller notify that user.
///
/// The unlock is committed before the holder is looked up, so a failed
/// lookup leaves `previous_holder` empty while `previous_holder_id` is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForceUnlockOutcome {
    pub previous_holder_id: Option<UserId>,
    pub previous_holder: Option<User>,
    pub article: Article,
}

/// Lock view with expiry applied at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockStatus {
    /// No holder, or the recorded lock has expired.
    Unlocked,
    Held {
        holder: User,
        acquired_at: Option<i64>,
        last_heartbeat_at: i64,
        expires_at: i64,
    },
}

struct Applied {
    article: Article,
    previous_holder: Option<UserId>,
    now_ms: i64,
}

/// Article service facade over record store and lock manager.
pub struct ArticleService<A: ArticleRepository, U: UserRepository, C: Clock> {
    articles: A,
    users: U,
    clock: C,
    locks: LockManager,
}

impl<A: ArticleRepository, U: UserRepository, C: Clock> ArticleService<A, U, C> {
    pub fn new(articles: A, users: U, clock: C, policy: LockPolicy) -> Self {
        Self {
            articles,
            users,
            clock,
            locks: LockManager::new(policy),
        }
    }

    /// Creates an unlocked article authored by an existing user.
    pub fn create_article(
        &self,
        request: &CreateArticleRequest,
    ) -> ArticleServiceResult<Article> {
        let author = self.resolve_user(&request.author_email)?;
        let article = Article::new(
            request.title.as_str(),
            request.content.as_str(),
            author.id,
            &request.co_authors,
        );

        let article_id = self.articles.create_article(&article)?;
        info!(
            "event=article_create module=service status=ok article_id={} author_id={} co_authors={}",
            article_id,
            author.id,
            article.co_authors.len()
        );

        self.articles
            .get_article(article_id)?
            .ok_or(ArticleServiceError::InconsistentState(
                "created article not found in read-back",
            ))
    }

    pub fn get_article(&self, article_id: ArticleId) -> ArticleServiceResult<Article> {
        self.load_article(article_id)
    }

    pub fn list_articles(&self, query: &ArticleListQuery) -> ArticleServiceResult<Vec<Article>> {
        Ok(self.articles.list_articles(query)?)
    }

    /// Takes or refreshes the edit lock for `actor_email`.
    pub fn acquire_lock(
        &self,
        article_id: ArticleId,
        actor_email: &str,
    ) -> ArticleServiceResult<LockGrant> {
        let actor = self.resolve_user(actor_email)?;
        let applied = self.execute(article_id, &actor, LockOperation::Acquire)?;
        let expires_at = applied
            .now_ms
            .saturating_add(self.locks.policy().timeout_ms());
        Ok(LockGrant {
            article_id,
            holder: actor,
            acquired_at: applied.now_ms,
            last_heartbeat_at: applied.now_ms,
            expires_at,
        })
    }

    /// Records a liveness signal from the current holder.
    pub fn heartbeat(
        &self,
        article_id: ArticleId,
        actor_email: &str,
    ) -> ArticleServiceResult<HeartbeatAck> {
        let actor = self.resolve_user(actor_email)?;
        let applied = self.execute(article_id, &actor, LockOperation::Heartbeat)?;
        Ok(HeartbeatAck {
            article_id,
            last_heartbeat_at: applied.now_ms,
            expires_at: applied
                .now_ms
                .saturating_add(self.locks.policy().timeout_ms()),
        })
    }

    /// Replaces content and releases the lock (last writer wins).
    pub fn save_and_release(
        &self,
        article_id: ArticleId,
        actor_email: &str,
        content: impl Into<String>,
    ) -> ArticleServiceResult<Article> {
        let actor = self.resolve_user(actor_email)?;
        let operation = LockOperation::SaveAndRelease {
            content: content.into(),
        };
        Ok(self.execute(article_id, &actor, operation)?.article)
    }

    /// Gives up the caller's lock without saving.
    pub fn release_lock(
        &self,
        article_id: ArticleId,
        actor_email: &str,
    ) -> ArticleServiceResult<Article> {
        let actor = self.resolve_user(actor_email)?;
        Ok(self.execute(article_id, &actor, LockOperation::Release)?.article)
    }

    /// Author-only override clearing any lock.
    pub fn force_unlock(
        &self,
        article_id: ArticleId,
        author_email: &str,
    ) -> ArticleServiceResult<ForceUnlockOutcome> {
        let author = self.resolve_user(author_email)?;
        let applied = self.execute(article_id, &author, LockOperation::ForceUnlock)?;
        info!(
            "event=lock_force_unlock module=service status=audit article_id={} author_id={} previous_holder_id={}",
            article_id,
            author.id,
            applied
                .previous_holder
                .map_or_else(|| "none".to_string(), |id| id.to_string())
        );

        let previous_holder = applied
            .previous_holder
            .and_then(|holder_id| self.lookup_previous_holder(article_id, holder_id));

        Ok(ForceUnlockOutcome {
            previous_holder_id: applied.previous_holder,
            previous_holder,
            article: applied.article,
        })
    }

    /// Reports who holds a live lock, treating expired locks as vacant.
    pub fn lock_status(&self, article_id: ArticleId) -> ArticleServiceResult<LockStatus> {
        let article = self.load_article(article_id)?;
        let lock = article.lock;
        let now_ms = self.clock.now_ms();

        match (
            self.locks.active_holder(&lock, now_ms),
            lock.last_heartbeat_at,
            self.locks.expires_at(&lock, now_ms),
        ) {
            (Some(holder_id), Some(last_heartbeat_at), Some(expires_at)) => {
                let holder = self.users.get_user(holder_id)?.ok_or(
                    ArticleServiceError::InconsistentState("lock holder missing"),
                )?;
                Ok(LockStatus::Held {
                    holder,
                    acquired_at: lock.lock_acquired_at,
                    last_heartbeat_at,
                    expires_at,
                })
            }
            _ => Ok(LockStatus::Unlocked),
        }
    }

    fn execute(
        &self,
        article_id: ArticleId,
        actor: &User,
        operation: LockOperation,
    ) -> ArticleServiceResult<Applied> {
        let event = operation.name();
        let mut attempt = 1;

        loop {
            let mut article = self.load_article(article_id)?;
            let now_ms = self.clock.now_ms();

            let transition = match self.locks.evaluate(&article, actor.id, &operation, now_ms) {
                Ok(transition) => transition,
                Err(denial) => {
                    info!(
                        "event={event} module=service status=denied article_id={article_id} actor_id={} reason={}",
                        actor.id,
                        denial_code(&denial)
                    );
                    return Err(self.map_denial(article_id, denial));
                }
            };

            let expected = article.lock;
            transition.apply_to(&mut article);
            let update = ArticleUpdate {
                content: article.content.clone(),
                lock: article.lock,
            };

            match self
                .articles
                .compare_and_write_article(article_id, &expected, &update)
            {
                Ok(()) => {
                    info!(
                        "event={event} module=service status=ok article_id={article_id} actor_id={} attempt={attempt}",
                        actor.id
                    );
                    return Ok(Applied {
                        article,
                        previous_holder: transition.previous_holder,
                        now_ms,
                    });
                }
                Err(RepoError::WriteConflict(_)) if attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        "event={event} module=service status=retry article_id={article_id} actor_id={} attempt={attempt} error_code=write_conflict",
                        actor.id
                    );
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        "event={event} module=service status=error article_id={article_id} actor_id={} attempt={attempt} error={err}",
                        actor.id
                    );
                    return Err(err.into());
                }
            }
        }
    }

    fn map_denial(&self, article_id: ArticleId, denial: LockError) -> ArticleServiceError {
        match denial {
            LockError::LockHeld { holder } => match self.users.get_user(holder) {
                Ok(Some(holder)) => ArticleServiceError::LockHeld { article_id, holder },
                Ok(None) => ArticleServiceError::InconsistentState("lock holder missing"),
                Err(err) => err.into(),
            },
            LockError::NotLockHolder => ArticleServiceError::NotLockHolder { article_id },
            LockError::NotAuthor => ArticleServiceError::NotAuthor { article_id },
        }
    }

    fn lookup_previous_holder(&self, article_id: ArticleId, holder_id: UserId) -> Option<User> {
        match self.users.get_user(holder_id) {
            Ok(Some(holder)) => Some(holder),
            Ok(None) => {
                warn!(
                    "event=lock_force_unlock module=service status=degraded article_id={article_id} previous_holder_id={holder_id} error_code=holder_missing"
                );
                None
            }
            Err(err) => {
                warn!(
                    "event=lock_force_unlock module=service status=degraded article_id={article_id} previous_holder_id={holder_id} error={err}"
                );
                None
            }
        }
    }

    fn resolve_user(&self, email: &str) -> ArticleServiceResult<User> {
        self.users
            .find_user_by_email(email)?
            .ok_or_else(|| ArticleServiceError::UserNotFound(email.trim().to_string()))
    }

    fn load_article(&self, article_id: ArticleId) -> ArticleServiceResult<Article> {
        self.articles
            .get_article(article_id)?
            .ok_or(ArticleServiceError::ArticleNotFound(article_id))
    }
}

fn denial_code(denial: &LockError) -> &'static str {
    match denial {
        LockError::LockHeld { .. } => "lock_held",
        LockError::NotLockHolder => "not_lock_holder",
        LockError::NotAuthor => "not_author",
    }
}
