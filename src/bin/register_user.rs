#![forbid(unsafe_code)]

//! Inserts a user row and prints its id.
//!
//! Accounts normally come from the external account service; this covers
//! local setups and smoke tests.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vidtube::{
    config::resolve_database_path,
    ids::UserId,
    models::{UserRecord, now},
    store::Store,
};

#[derive(Parser, Debug)]
#[command(name = "register_user", about = "Create a VidTube user")]
struct RegisterArgs {
    /// Unique handle.
    username: String,

    /// Display name. Defaults to the username.
    #[arg(long)]
    full_name: Option<String>,

    /// Avatar URL.
    #[arg(long)]
    avatar: Option<String>,

    /// SQLite database file (overrides DATABASE_PATH).
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl RegisterArgs {
    fn into_record(self) -> Result<(UserRecord, Option<PathBuf>, Option<PathBuf>)> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            bail!("username must not be blank");
        }
        let full_name = self
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| username.clone());
        let avatar = self
            .avatar
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        let record = UserRecord {
            id: UserId::new(),
            username,
            full_name,
            avatar,
            created_at: now(),
        };
        Ok((record, self.db_path, self.env_file))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (user, db_path, env_file) = RegisterArgs::parse().into_record()?;
    let db_path = resolve_database_path(db_path, env_file.as_deref())?;
    let store = Store::open(&db_path)
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;
    store
        .insert_user(&user)
        .await
        .with_context(|| format!("registering {}", user.username))?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    println!("{}", user.id);
    Ok(())
}
