//! Opening the `SQLite` database that backs rules and the execution log.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::StorageError;

/// Writers wait this long on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the rule store and execution log live.
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:autorule.db` or `sqlite::memory:`).
    pub database_url: String,
}

impl Config {
    /// Open the database, creating the file when missing, and bring the
    /// schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the URL is invalid, the connection fails
    /// or a migration fails.
    pub async fn build(self) -> Result<Database, StorageError> {
        let pool = self
            .pool_options()
            .connect_with(self.connect_options()?)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(database_url = %self.database_url, "execution store ready");
        Ok(Database { pool })
    }

    fn in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, StorageError> {
        let options = SqliteConnectOptions::from_str(&self.database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        // WAL lets the query service read while workers append records.
        Ok(if self.in_memory() {
            options
        } else {
            options.journal_mode(SqliteJournalMode::Wal)
        })
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        // Each in-memory connection would see its own empty database.
        if self.in_memory() {
            SqlitePoolOptions::new().max_connections(1)
        } else {
            SqlitePoolOptions::new()
        }
    }
}

/// An open, migrated database.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked-out connections to return, then close them all.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
