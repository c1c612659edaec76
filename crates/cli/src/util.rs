use std::{fs::File, io::BufReader, sync::Arc};

use anyhow::{Context, Result};
use roster_core::config::Config;
use roster_db::Database;
use roster_github::{FetchCache, GitHub};
use roster_jobs::RefreshEngine;
use typed_path::{Utf8NativePath, Utf8NativePathBuf};

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<Utf8NativePathBuf, String> {
    Ok(Utf8NativePathBuf::from(value))
}

pub fn load_config(path: &Utf8NativePath) -> Result<Config> {
    let file = File::open(path.with_platform_encoding())
        .with_context(|| format!("Failed to open config file {}", path))?;
    serde_yaml::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse config file {}", path))
}

pub type Engine = RefreshEngine<GitHub, Database>;

/// Open the database and the GitHub client described by `config`.
pub async fn open(config: &Config) -> Result<(Arc<Database>, Arc<GitHub>)> {
    let db = Arc::new(Database::new(&config.db).await.context("Failed to open database")?);
    let github = GitHub::new(&config.github, FetchCache::from_config(&config.github))
        .await
        .context("Failed to create GitHub client")?;
    Ok((db, github))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal;
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
