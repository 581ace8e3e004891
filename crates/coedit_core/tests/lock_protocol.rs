use coedit_core::db::open_db_in_memory;
use coedit_core::{
    ArticleId, ArticleListQuery, ArticleService, ArticleServiceError, CreateArticleRequest,
    LockPolicy, LockStatus, ManualClock, RepoResult, SqliteArticleRepository,
    SqliteUserRepository, User, UserId, UserRepository, UserService,
};
use rusqlite::{params, Connection};
use std::time::Duration;
use uuid::Uuid;

const T0: i64 = 1_700_000_000_000;
const AUTHOR: &str = "author@example.com";
const BOB: &str = "bob@example.com";
const CAROL: &str = "carol@example.com";

type Service<'a> =
    ArticleService<SqliteArticleRepository<'a>, SqliteUserRepository<'a>, &'a ManualClock>;

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());
    for email in [AUTHOR, BOB, CAROL] {
        users.register_user(email, None).unwrap();
    }
    conn
}

fn service<'a>(conn: &'a Connection, clock: &'a ManualClock) -> Service<'a> {
    ArticleService::new(
        SqliteArticleRepository::try_new(conn).unwrap(),
        SqliteUserRepository::try_new(conn).unwrap(),
        clock,
        LockPolicy::from_minutes(15).unwrap(),
    )
}

fn create(service: &Service<'_>) -> ArticleId {
    service
        .create_article(&CreateArticleRequest {
            title: "Shared draft".to_string(),
            content: "v1".to_string(),
            author_email: AUTHOR.to_string(),
            co_authors: vec![BOB.to_string(), CAROL.to_string()],
        })
        .unwrap()
        .id
}

#[test]
fn documented_lock_lifecycle_scenario() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    let grant = service.acquire_lock(article_id, BOB).unwrap();
    assert_eq!(grant.holder.email, BOB);
    assert_eq!(grant.acquired_at, T0);

    clock.advance(Duration::from_secs(60));
    match service.acquire_lock(article_id, CAROL).unwrap_err() {
        ArticleServiceError::LockHeld { holder, .. } => assert_eq!(holder.email, BOB),
        other => panic!("unexpected error: {other}"),
    }

    clock.advance(Duration::from_secs(15 * 60));
    let grant = service.acquire_lock(article_id, CAROL).unwrap();
    assert_eq!(grant.holder.email, CAROL);

    let err = service.heartbeat(article_id, BOB).unwrap_err();
    assert!(matches!(err, ArticleServiceError::NotLockHolder { .. }));

    let outcome = service.force_unlock(article_id, AUTHOR).unwrap();
    assert_eq!(outcome.previous_holder.unwrap().email, CAROL);
    assert!(!outcome.article.lock.is_held());
    assert!(!service.get_article(article_id).unwrap().lock.is_held());
}

#[test]
fn acquire_by_holder_is_idempotent_renewal() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    service.acquire_lock(article_id, BOB).unwrap();
    clock.advance(Duration::from_secs(5 * 60));
    let renewed = service.acquire_lock(article_id, BOB).unwrap();

    assert_eq!(renewed.acquired_at, T0 + 5 * 60 * 1000);
    let stored = service.get_article(article_id).unwrap().lock;
    assert_eq!(stored.lock_acquired_at, Some(renewed.acquired_at));
    assert_eq!(stored.last_heartbeat_at, Some(renewed.acquired_at));
}

#[test]
fn heartbeat_keeps_lock_alive_past_initial_timeout() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    service.acquire_lock(article_id, BOB).unwrap();
    clock.advance(Duration::from_secs(10 * 60));
    let ack = service.heartbeat(article_id, BOB).unwrap();
    assert_eq!(ack.last_heartbeat_at, T0 + 10 * 60 * 1000);

    clock.advance(Duration::from_secs(10 * 60));
    assert!(matches!(
        service.acquire_lock(article_id, CAROL),
        Err(ArticleServiceError::LockHeld { .. })
    ));
    let stored = service.get_article(article_id).unwrap().lock;
    assert_eq!(stored.lock_acquired_at, Some(T0));
}

#[test]
fn heartbeat_cannot_revive_an_expired_lock_after_takeover() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    service.acquire_lock(article_id, BOB).unwrap();
    clock.advance(Duration::from_secs(20 * 60));
    service.acquire_lock(article_id, CAROL).unwrap();

    assert!(matches!(
        service.heartbeat(article_id, BOB),
        Err(ArticleServiceError::NotLockHolder { .. })
    ));
    assert!(matches!(
        service.heartbeat(article_id, AUTHOR),
        Err(ArticleServiceError::NotLockHolder { .. })
    ));
}

#[test]
fn save_releases_lock_and_replaces_content() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    service.acquire_lock(article_id, BOB).unwrap();
    let saved = service.save_and_release(article_id, BOB, "v2").unwrap();
    assert_eq!(saved.content, "v2");
    assert!(!saved.lock.is_held());
    assert_eq!(saved.lock.lock_acquired_at, None);
    assert_eq!(saved.lock.last_heartbeat_at, None);

    // Continuing to edit requires a fresh acquire.
    assert!(matches!(
        service.heartbeat(article_id, BOB),
        Err(ArticleServiceError::NotLockHolder { .. })
    ));
    assert_eq!(service.get_article(article_id).unwrap(), saved);
}

#[test]
fn denied_save_persists_nothing() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    service.acquire_lock(article_id, BOB).unwrap();
    let before = service.get_article(article_id).unwrap();

    let err = service
        .save_and_release(article_id, CAROL, "carol overwrite")
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(service.get_article(article_id).unwrap(), before);
}

#[test]
fn save_over_expired_lock_is_allowed() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    service.acquire_lock(article_id, BOB).unwrap();
    clock.advance(Duration::from_secs(16 * 60));

    let saved = service.save_and_release(article_id, CAROL, "carol").unwrap();
    assert_eq!(saved.content, "carol");
    assert!(!saved.lock.is_held());
}

#[test]
fn release_lock_clears_fields_but_keeps_content() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    service.acquire_lock(article_id, BOB).unwrap();
    assert!(matches!(
        service.release_lock(article_id, CAROL),
        Err(ArticleServiceError::NotLockHolder { .. })
    ));

    let released = service.release_lock(article_id, BOB).unwrap();
    assert_eq!(released.content, "v1");
    assert!(!released.lock.is_held());
}

#[test]
fn force_unlock_rejects_non_author_even_when_holder() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    service.acquire_lock(article_id, BOB).unwrap();
    let err = service.force_unlock(article_id, BOB).unwrap_err();
    assert!(matches!(err, ArticleServiceError::NotAuthor { .. }));
    assert!(!err.is_retryable());
    assert!(service.get_article(article_id).unwrap().lock.is_held());
}

#[test]
fn force_unlock_is_idempotent() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    service.acquire_lock(article_id, BOB).unwrap();
    let first = service.force_unlock(article_id, AUTHOR).unwrap();
    assert_eq!(
        first.previous_holder.clone().map(|user| user.email).as_deref(),
        Some(BOB)
    );
    assert!(first.previous_holder_id.is_some());

    let second = service.force_unlock(article_id, AUTHOR).unwrap();
    assert!(second.previous_holder.is_none());
    assert!(second.previous_holder_id.is_none());
    assert_eq!(second.article, first.article);
}

#[test]
fn lock_status_treats_expired_lock_as_vacant_without_clearing_it() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    assert_eq!(service.lock_status(article_id).unwrap(), LockStatus::Unlocked);

    service.acquire_lock(article_id, BOB).unwrap();
    match service.lock_status(article_id).unwrap() {
        LockStatus::Held {
            holder, expires_at, ..
        } => {
            assert_eq!(holder.email, BOB);
            assert_eq!(expires_at, T0 + 15 * 60 * 1000);
        }
        LockStatus::Unlocked => panic!("lock should be held"),
    }

    clock.advance(Duration::from_secs(15 * 60 + 1));
    assert_eq!(service.lock_status(article_id).unwrap(), LockStatus::Unlocked);
    // Stale metadata stays in storage until the next write touches it.
    let stored = service.get_article(article_id).unwrap();
    assert!(stored.lock.is_held());
}

#[test]
fn unknown_user_and_article_are_reported() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    match service.acquire_lock(article_id, "ghost@example.com").unwrap_err() {
        ArticleServiceError::UserNotFound(email) => assert_eq!(email, "ghost@example.com"),
        other => panic!("unexpected error: {other}"),
    }

    let missing = Uuid::new_v4();
    assert!(matches!(
        service.acquire_lock(missing, BOB),
        Err(ArticleServiceError::ArticleNotFound(id)) if id == missing
    ));
    assert!(matches!(
        service.get_article(missing),
        Err(ArticleServiceError::ArticleNotFound(_))
    ));
}

#[test]
fn create_article_requires_registered_author_and_normalizes_co_authors() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);

    let err = service
        .create_article(&CreateArticleRequest {
            title: "Nope".to_string(),
            author_email: "ghost@example.com".to_string(),
            ..CreateArticleRequest::default()
        })
        .unwrap_err();
    assert!(matches!(err, ArticleServiceError::UserNotFound(_)));

    let article = service
        .create_article(&CreateArticleRequest {
            title: "Yes".to_string(),
            content: String::new(),
            author_email: AUTHOR.to_string(),
            co_authors: vec![" bob@example.com".to_string(), String::new(), BOB.to_string()],
        })
        .unwrap();
    assert_eq!(article.co_authors, vec![BOB.to_string()]);
    assert!(!article.lock.is_held());

    let listed = service.list_articles(&ArticleListQuery::default()).unwrap();
    assert_eq!(listed, vec![article]);
}

#[test]
fn register_user_rejects_duplicates() {
    let conn = setup();
    let users = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());

    assert!(users.register_user(BOB, Some("Bob".to_string())).is_err());
    assert_eq!(users.list_users().unwrap().len(), 3);
    assert!(users.find_user_by_email(CAROL).unwrap().is_some());
}

#[test]
fn heartbeat_on_partial_lock_row_requires_reacquire() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let service = service(&conn, &clock);
    let article_id = create(&service);

    let bob = service.acquire_lock(article_id, BOB).unwrap().holder;
    conn.execute(
        "UPDATE articles SET lock_acquired_at = NULL WHERE uuid = ?1;",
        params![article_id.to_string()],
    )
    .unwrap();
    let before = service.get_article(article_id).unwrap();
    assert_eq!(before.lock.lock_holder, Some(bob.id));

    clock.advance(Duration::from_secs(60));
    assert!(matches!(
        service.heartbeat(article_id, BOB),
        Err(ArticleServiceError::NotLockHolder { article_id: id }) if id == article_id
    ));
    assert_eq!(service.get_article(article_id).unwrap(), before);

    let grant = service.acquire_lock(article_id, BOB).unwrap();
    assert_eq!(grant.acquired_at, T0 + 60 * 1000);
    assert!(service.get_article(article_id).unwrap().lock.is_consistent());
    service.heartbeat(article_id, BOB).unwrap();
}

/// User store that cannot resolve one id, as if the row vanished.
struct UsersWithout<'conn> {
    inner: SqliteUserRepository<'conn>,
    missing: UserId,
}

impl UserRepository for UsersWithout<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        self.inner.create_user(user)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        if id == self.missing {
            return Ok(None);
        }
        self.inner.get_user(id)
    }

    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.inner.find_user_by_email(email)
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        self.inner.list_users()
    }
}

#[test]
fn force_unlock_commits_even_when_previous_holder_cannot_be_resolved() {
    let conn = setup();
    let clock = ManualClock::new(T0);
    let article_id = create(&service(&conn, &clock));
    let bob = service(&conn, &clock)
        .acquire_lock(article_id, BOB)
        .unwrap()
        .holder;

    let service = ArticleService::new(
        SqliteArticleRepository::try_new(&conn).unwrap(),
        UsersWithout {
            inner: SqliteUserRepository::try_new(&conn).unwrap(),
            missing: bob.id,
        },
        &clock,
        LockPolicy::default(),
    );

    let outcome = service.force_unlock(article_id, AUTHOR).unwrap();
    assert_eq!(outcome.previous_holder_id, Some(bob.id));
    assert_eq!(outcome.previous_holder, None);
    assert!(!service.get_article(article_id).unwrap().lock.is_held());
}
