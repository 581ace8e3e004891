//! Article repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist articles with their ordered co-author list.
//! - Provide the compare-and-write primitive guarding lock transitions.
//!
//! # Invariants
//! - `compare_and_write_article` applies only when all three stored lock
//!   columns equal the expected snapshot (NULL-safe comparison).
//! - `author_uuid` is never updated.
//! - Reads tolerate a partial lock triple; writes refuse one.

use crate::model::article::{Article, ArticleId, ArticleLock, ArticleValidationError};
use crate::repo::{ensure_tables, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const ARTICLE_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    content,
    author_uuid,
    lock_holder_uuid,
    lock_acquired_at,
    last_heartbeat_at
FROM articles";

/// New field values written by a lock transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleUpdate {
    pub content: String,
    pub lock: ArticleLock,
}

/// Query options for listing articles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleListQuery {
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for article records.
pub trait ArticleRepository {
    fn create_article(&self, article: &Article) -> RepoResult<ArticleId>;
    fn get_article(&self, id: ArticleId) -> RepoResult<Option<Article>>;
    /// Lists articles in creation order.
    fn list_articles(&self, query: &ArticleListQuery) -> RepoResult<Vec<Article>>;
    /// Writes `update` only if the stored lock still equals `expected`.
    ///
    /// # Errors
    /// - `ArticleNotFound` when the row does not exist.
    /// - `WriteConflict` when the stored lock differs from `expected`.
    fn compare_and_write_article(
        &self,
        id: ArticleId,
        expected: &ArticleLock,
        update: &ArticleUpdate,
    ) -> RepoResult<()>;
}

/// SQLite-backed article repository.
pub struct SqliteArticleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteArticleRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["articles", "article_co_authors"])?;
        Ok(Self { conn })
    }
}

impl ArticleRepository for SqliteArticleRepository<'_> {
    fn create_article(&self, article: &Article) -> RepoResult<ArticleId> {
        article.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let article_uuid = article.id.to_string();
        tx.execute(
            "INSERT INTO articles (
                uuid,
                title,
                content,
                author_uuid,
                lock_holder_uuid,
                lock_acquired_at,
                last_heartbeat_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                article_uuid.as_str(),
                article.title.as_str(),
                article.content.as_str(),
                article.author_id.to_string(),
                article.lock.lock_holder.map(|id| id.to_string()),
                article.lock.lock_acquired_at,
                article.lock.last_heartbeat_at,
            ],
        )?;

        for (position, identity) in article.co_authors.iter().enumerate() {
            tx.execute(
                "INSERT INTO article_co_authors (article_uuid, position, identity)
                 VALUES (?1, ?2, ?3);",
                params![article_uuid.as_str(), position as i64, identity.as_str()],
            )?;
        }

        tx.commit()?;
        Ok(article.id)
    }

    fn get_article(&self, id: ArticleId) -> RepoResult<Option<Article>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ARTICLE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_article_row(self.conn, row)?)),
            None => Ok(None),
        }
    }

    fn list_articles(&self, query: &ArticleListQuery) -> RepoResult<Vec<Article>> {
        let mut sql = format!("{ARTICLE_SELECT_SQL} ORDER BY id ASC");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1");
        }
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut articles = Vec::new();
        while let Some(row) = rows.next()? {
            articles.push(parse_article_row(self.conn, row)?);
        }
        Ok(articles)
    }

    fn compare_and_write_article(
        &self,
        id: ArticleId,
        expected: &ArticleLock,
        update: &ArticleUpdate,
    ) -> RepoResult<()> {
        if !update.lock.is_consistent() {
            return Err(ArticleValidationError::InconsistentLock.into());
        }

        let article_uuid = id.to_string();
        let changed = self.conn.execute(
            "UPDATE articles
             SET
                content = ?2,
                lock_holder_uuid = ?3,
                lock_acquired_at = ?4,
                last_heartbeat_at = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND lock_holder_uuid IS ?6
               AND lock_acquired_at IS ?7
               AND last_heartbeat_at IS ?8;",
            params![
                article_uuid.as_str(),
                update.content.as_str(),
                update.lock.lock_holder.map(|holder| holder.to_string()),
                update.lock.lock_acquired_at,
                update.lock.last_heartbeat_at,
                expected.lock_holder.map(|holder| holder.to_string()),
                expected.lock_acquired_at,
                expected.last_heartbeat_at,
            ],
        )?;

        if changed == 1 {
            return Ok(());
        }

        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM articles WHERE uuid = ?1);",
            [article_uuid.as_str()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Err(RepoError::WriteConflict(id))
        } else {
            Err(RepoError::ArticleNotFound(id))
        }
    }
}

fn parse_article_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Article> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "articles.uuid")?;
    let author_text: String = row.get("author_uuid")?;
    let author_id = parse_uuid(&author_text, "articles.author_uuid")?;
    let lock_holder = match row.get::<_, Option<String>>("lock_holder_uuid")? {
        Some(value) => Some(parse_uuid(&value, "articles.lock_holder_uuid")?),
        None => None,
    };

    Ok(Article {
        id,
        title: row.get("title")?,
        content: row.get("content")?,
        author_id,
        co_authors: load_co_authors(conn, &uuid_text)?,
        lock: ArticleLock {
            lock_holder,
            lock_acquired_at: row.get("lock_acquired_at")?,
            last_heartbeat_at: row.get("last_heartbeat_at")?,
        },
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn load_co_authors(conn: &Connection, article_uuid: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT identity
         FROM article_co_authors
         WHERE article_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([article_uuid])?;
    let mut co_authors = Vec::new();
    while let Some(row) = rows.next()? {
        co_authors.push(row.get(0)?);
    }
    Ok(co_authors)
}
