pub mod deployments;

use anyhow::{Context, Result};
use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use std::{fs::File, io, path::Path, str::FromStr, time::Duration};

/// Evaluates to the current time in epoch milliseconds using the database clock. Shared between the schema
/// defaults and the update/delete statements so that every timestamp on a row comes from the same clock.
pub const NOW_EPOCH_MILLI: &str = "CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER)";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StorageError {
    #[error("could not establish connection to database; {0}")]
    Connection(String),

    #[error("requested entity not found")]
    NotFound,

    #[error("unexpected storage error occurred; {0}")]
    Unknown(String),
}

/// Row misses become [`StorageError::NotFound`]; everything else is reported with the sqlite result code when
/// there is one. See the codes here: https://www.sqlite.org/rescode.html
pub fn map_sqlx_error(e: sqlx::Error, query: &str) -> StorageError {
    match e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(database_err) => match database_err.code() {
            Some(err_code) => StorageError::Unknown(format!(
                "Error occurred while running query; [{err_code}] {database_err}; query: {query}"
            )),
            None => StorageError::Unknown(format!(
                "Error occurred while running query; {database_err}; query: {query}"
            )),
        },
        _ => StorageError::Unknown(format!(
            "Error occurred while running query; {:#?}; query: {query}",
            e
        )),
    }
}

#[derive(Debug, Clone)]
pub struct Db {
    read_pool: Pool<Sqlite>,
    write_pool: Pool<Sqlite>,
}

// Create file if not exists.
fn touch_file(path: &Path) -> io::Result<()> {
    if !path.exists() {
        File::create(path)?;
    }

    Ok(())
}

impl Db {
    pub async fn new(path: &str, busy_timeout: Duration) -> Result<Self> {
        touch_file(Path::new(path))
            .with_context(|| format!("Could not create database file at '{path}'"))?;

        // Reads get a pool of many connections; writes are funneled through a single connection so sqlite
        // never hands back "database is locked(error: 5)" under concurrent writers.
        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .with_context(|| format!("Could not parse database path '{path}'"))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(busy_timeout);

        let read_pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(connect_options.clone())
            .await
            .context("Could not open read connection pool")?;

        let write_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .context("Could not open write connection pool")?;

        sqlx::migrate!("src/storage/migrations")
            .run(&write_pool)
            .await
            .context("Could not run database migrations")?;

        Ok(Db {
            read_pool,
            write_pool,
        })
    }

    pub async fn read_conn(&self) -> Result<PoolConnection<Sqlite>, StorageError> {
        self.read_pool
            .acquire()
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))
    }

    pub async fn write_conn(&self) -> Result<PoolConnection<Sqlite>, StorageError> {
        self.write_pool
            .acquire()
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))
    }
}
