// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary and applied
//! on every open. Refinery records applied versions in
//! `refinery_schema_history`, so reopening an existing database is a no-op.

use courier_core::CourierError;
use tracing::debug;

use crate::database::Database;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply all pending migrations on the database's connection thread.
pub(crate) async fn run(db: &Database) -> Result<(), CourierError> {
    let applied = db
        .connection()
        .call(|conn| -> Result<usize, refinery::Error> {
            let report = embedded::migrations::runner().run(conn)?;
            Ok(report.applied_migrations().len())
        })
        .await
        .map_err(|e| CourierError::Storage {
            source: Box::new(e),
        })?;
    debug!(applied, "migrations complete");
    Ok(())
}
