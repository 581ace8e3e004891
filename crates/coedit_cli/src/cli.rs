//! CLI argument parsing for coedit.
//!
//! Each invocation performs one operation against the SQLite store; lock
//! expiry is evaluated when the operation runs.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Coedit: co-author articles under a pessimistic edit lock.
#[derive(Parser, Debug)]
#[command(name = "coedit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = "coedit.db")]
    pub db: PathBuf,

    /// Idle minutes before a lock without heartbeat expires.
    /// Falls back to COEDIT_LOCK_TIMEOUT_MINUTES, then 15.
    #[arg(long, global = true)]
    pub lock_timeout_minutes: Option<u64>,

    /// Log level (trace|debug|info|warn|error). Needs --log-dir.
    #[arg(long, global = true, requires = "log_dir")]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, global = true)]
    pub log_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register and list users.
    #[command(subcommand)]
    User(UserCommand),

    /// Create, read and save articles.
    #[command(subcommand)]
    Article(ArticleCommand),

    /// Acquire, keep alive, release and inspect edit locks.
    #[command(subcommand)]
    Lock(LockCommand),
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a new user.
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// List registered users.
    List,
}

#[derive(Subcommand, Debug)]
pub enum ArticleCommand {
    /// Create an unlocked article owned by an existing user.
    Create(CreateArgs),
    /// Show one article.
    Show { id: Uuid },
    /// List articles in creation order.
    List {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Replace content and release the lock.
    Save {
        id: Uuid,
        #[arg(long)]
        user: String,
        #[arg(long)]
        content: String,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub title: String,

    /// Email of the author; must already be registered.
    #[arg(long)]
    pub author: String,

    #[arg(long, default_value = "")]
    pub content: String,

    /// Co-author identity; repeatable.
    #[arg(long = "co-author")]
    pub co_author: Vec<String>,

    /// Comma-separated co-authors, used when no --co-author is given.
    #[arg(long)]
    pub co_authors: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum LockCommand {
    /// Take the edit lock (or renew your own).
    Acquire {
        id: Uuid,
        #[arg(long)]
        user: String,
    },
    /// Signal that you are still editing.
    Heartbeat {
        id: Uuid,
        #[arg(long)]
        user: String,
    },
    /// Give up your lock without saving.
    Release {
        id: Uuid,
        #[arg(long)]
        user: String,
    },
    /// Show the live lock holder, if any.
    Status { id: Uuid },
    /// Clear any lock; only the original author may do this.
    ForceUnlock {
        id: Uuid,
        #[arg(long)]
        author: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::{ArticleCommand, Cli, Command, LockCommand};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_lock_acquire_with_global_options() {
        let id = uuid::Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "coedit",
            "lock",
            "acquire",
            id.as_str(),
            "--user",
            "bob@example.com",
            "--db",
            "/tmp/x.db",
            "--lock-timeout-minutes",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.lock_timeout_minutes, Some(5));
        assert_eq!(cli.db.to_str(), Some("/tmp/x.db"));
        match cli.command {
            Command::Lock(LockCommand::Acquire { user, .. }) => assert_eq!(user, "bob@example.com"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_repeated_co_authors() {
        let cli = Cli::try_parse_from([
            "coedit",
            "article",
            "create",
            "--title",
            "Plan",
            "--author",
            "ada@example.com",
            "--co-author",
            "bob@example.com",
            "--co-author",
            "cy@example.com",
        ])
        .unwrap();

        match cli.command {
            Command::Article(ArticleCommand::Create(args)) => {
                assert_eq!(args.co_author, vec!["bob@example.com", "cy@example.com"]);
                assert_eq!(args.co_authors, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn log_level_requires_log_dir() {
        let err = Cli::try_parse_from(["coedit", "--log-level", "debug", "user", "list"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from([
            "coedit",
            "user",
            "list",
            "--log-level",
            "debug",
            "--log-dir",
            "/tmp/coedit-logs",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn rejects_malformed_article_id() {
        assert!(Cli::try_parse_from(["coedit", "lock", "status", "not-a-uuid"]).is_err());
    }
}
