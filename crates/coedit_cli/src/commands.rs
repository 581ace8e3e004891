//! Command handlers: open the store, run one service call, print JSON.

use crate::cli::{ArticleCommand, Cli, Command, CreateArgs, LockCommand, UserCommand};
use anyhow::{Context, Result};
use coedit_core::db::open_db;
use coedit_core::{
    default_log_level, init_logging, resolve_co_authors, ArticleListQuery, ArticleService,
    CreateArticleRequest, LockPolicy, SqliteArticleRepository, SqliteUserRepository, SystemClock,
    UserService,
};
use log::debug;
use rusqlite::Connection;
use serde::Serialize;

type Service<'conn> =
    ArticleService<SqliteArticleRepository<'conn>, SqliteUserRepository<'conn>, SystemClock>;

pub fn dispatch(cli: Cli) -> Result<()> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).map_err(anyhow::Error::msg)?;
    }

    let policy = match cli.lock_timeout_minutes {
        Some(minutes) => LockPolicy::from_minutes(minutes)?,
        None => LockPolicy::from_env()?,
    };
    debug!(
        "event=cli_start module=cli status=ok lock_timeout_ms={}",
        policy.timeout_ms()
    );

    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;

    match cli.command {
        Command::User(command) => run_user(&conn, command),
        Command::Article(command) => run_article(&article_service(&conn, policy)?, command),
        Command::Lock(command) => run_lock(&article_service(&conn, policy)?, command),
    }
}

fn article_service(conn: &Connection, policy: LockPolicy) -> Result<Service<'_>> {
    Ok(ArticleService::new(
        SqliteArticleRepository::try_new(conn)?,
        SqliteUserRepository::try_new(conn)?,
        SystemClock,
        policy,
    ))
}

fn run_user(conn: &Connection, command: UserCommand) -> Result<()> {
    let users = UserService::new(SqliteUserRepository::try_new(conn)?);
    match command {
        UserCommand::Add { email, name } => print_json(&users.register_user(&email, name)?),
        UserCommand::List => print_json(&users.list_users()?),
    }
}

fn run_article(service: &Service<'_>, command: ArticleCommand) -> Result<()> {
    match command {
        ArticleCommand::Create(args) => print_json(&service.create_article(&create_request(args))?),
        ArticleCommand::Show { id } => print_json(&service.get_article(id)?),
        ArticleCommand::List { limit, offset } => {
            print_json(&service.list_articles(&ArticleListQuery { limit, offset })?)
        }
        ArticleCommand::Save { id, user, content } => {
            print_json(&service.save_and_release(id, &user, content)?)
        }
    }
}

fn run_lock(service: &Service<'_>, command: LockCommand) -> Result<()> {
    match command {
        LockCommand::Acquire { id, user } => print_json(&service.acquire_lock(id, &user)?),
        LockCommand::Heartbeat { id, user } => print_json(&service.heartbeat(id, &user)?),
        LockCommand::Release { id, user } => print_json(&service.release_lock(id, &user)?),
        LockCommand::Status { id } => print_json(&service.lock_status(id)?),
        LockCommand::ForceUnlock { id, author } => print_json(&service.force_unlock(id, &author)?),
    }
}

fn create_request(args: CreateArgs) -> CreateArticleRequest {
    CreateArticleRequest {
        co_authors: resolve_co_authors(&args.co_author, args.co_authors.as_deref()),
        title: args.title,
        content: args.content,
        author_email: args.author,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
