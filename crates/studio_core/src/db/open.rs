//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Bound every statement by a busy timeout so callers never hang.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have migrations fully applied.
//! - Returned connections run in WAL mode when file-backed.

use super::migrations::apply_migrations;
use super::{OpenError, OpenResult};
use crate::config::DatabaseLocation;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Busy timeout applied when the caller does not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a SQLite database file and applies all pending migrations.
pub fn open_db(path: impl AsRef<Path>) -> OpenResult<Connection> {
    open_with("file", DEFAULT_BUSY_TIMEOUT, || {
        Connection::open(path.as_ref())
    })
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> OpenResult<Connection> {
    open_with("memory", DEFAULT_BUSY_TIMEOUT, Connection::open_in_memory)
}

/// Opens the configured primary store location.
///
/// # Side effects
/// - Creates the parent directory of a file-backed database when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_location(location: &DatabaseLocation, busy_timeout: Duration) -> OpenResult<Connection> {
    match location {
        DatabaseLocation::Memory => {
            open_with("memory", busy_timeout, Connection::open_in_memory)
        }
        DatabaseLocation::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| {
                    error!(
                        "event=db_open module=db status=error mode=file error_code=db_dir_failed error={source}"
                    );
                    OpenError::Directory {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
            open_with("file", busy_timeout, || Connection::open(path))
        }
    }
}

fn open_with<F>(mode: &'static str, busy_timeout: Duration, opener: F) -> OpenResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match opener() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, mode, busy_timeout) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    mode: &'static str,
    busy_timeout: Duration,
) -> OpenResult<()> {
    conn.busy_timeout(busy_timeout)?;
    if mode == "file" {
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    }
    apply_migrations(conn)?;
    Ok(())
}
