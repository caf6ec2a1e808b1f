//! Primary store connections.
//!
//! Everything that touches a raw `rusqlite::Connection` before a store owns
//! it lives here: opening, pragmas and the ordered schema steps.
//!
//! # Invariants
//! - Schema version is `PRAGMA user_version`; a database written by a newer
//!   build is refused rather than downgraded.
//! - A connection handed out by this module is fully migrated.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_location, DEFAULT_BUSY_TIMEOUT};

pub type OpenResult<T> = Result<T, OpenError>;

/// Why a primary store connection could not be produced.
#[derive(Debug)]
pub enum OpenError {
    /// Parent directory of a file database is missing and cannot be made.
    Directory { path: PathBuf, source: io::Error },
    /// File carries a schema this build does not know.
    SchemaTooNew { found: u32, supported: u32 },
    Sqlite(rusqlite::Error),
}

impl Display for OpenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory { path, source } => {
                write!(f, "cannot create database directory {}: {source}", path.display())
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "schema version {found} was written by a newer build (this build knows up to {supported})"
            ),
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
        }
    }
}

impl Error for OpenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Directory { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for OpenError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
