// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so each
//! `call` closure is atomic with respect to every other one. Components keep
//! their multi-statement updates inside one closure (and one transaction).

use std::path::Path;

use async_trait::async_trait;
use courier_config::model::StorageConfig;
use courier_core::{AdapterType, CourierError, HealthStatus, PluginAdapter};
use tracing::{debug, info};

use crate::migrations;

/// Convert a tokio-rusqlite error into the shared storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CourierError {
    CourierError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the Courier SQLite database.
///
/// Cheap to clone; all clones share one background connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, CourierError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(CourierError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(CourierError::storage)?;
        let db = Self {
            conn,
            path: path.to_string(),
        };
        db.configure(wal_mode).await?;
        migrations::run(&db).await?;
        info!(path = %path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open the database described by the storage section of the config.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, CourierError> {
        Self::open(&config.database_path, config.wal_mode).await
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, CourierError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(CourierError::storage)?;
        let db = Self {
            conn,
            path: ":memory:".to_string(),
        };
        db.configure(false).await?;
        migrations::run(&db).await?;
        Ok(db)
    }

    async fn configure(&self, wal_mode: bool) -> Result<(), CourierError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
                }
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Path the database was opened from (`:memory:` for in-memory).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), CourierError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.path, "wal checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the connection.
    ///
    /// Other clones of this handle see `ConnectionClosed` errors afterwards.
    pub async fn close(self) -> Result<(), CourierError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(map_tr_err)?;
        info!(path = %self.path, "database closed");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let probe = self
            .conn
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await;
        Ok(match probe {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        self.checkpoint().await
    }
}
