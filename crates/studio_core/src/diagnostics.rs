//! Operator-facing schema bootstrap and storage diagnostics.
//!
//! # Responsibility
//! - Apply primary store migrations on demand and summarize the outcome.
//! - Probe the configured primary store without modifying it.
//!
//! # Invariants
//! - Reports never contain credentials, tokens or content values.
//! - The probe never creates a missing database file or alters the schema.

use crate::config::{DatabaseLocation, SiteConfig};
use crate::db::migrations::{current_user_version, latest_version, REQUIRED_TABLES};
use crate::db::open_location;
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub success: bool,
    pub message: String,
    /// Set when no primary store is configured at all.
    pub needs_configuration: bool,
}

/// Creates or upgrades the primary store schema.
pub fn migrate(config: &SiteConfig) -> MigrationReport {
    let Some(database) = config.database.as_ref() else {
        return MigrationReport {
            success: false,
            message: "no database configured; set STUDIO_DATABASE_URL or DATABASE_URL".to_string(),
            needs_configuration: true,
        };
    };

    match open_location(&database.location, config.storage_timeout)
        .and_then(|conn| current_user_version(&conn))
    {
        Ok(version) => {
            info!("event=schema_migrate module=diagnostics status=ok version={version}");
            MigrationReport {
                success: true,
                message: format!("schema is at version {version}"),
                needs_configuration: false,
            }
        }
        Err(err) => {
            error!("event=schema_migrate module=diagnostics status=error error={err}");
            MigrationReport {
                success: false,
                message: format!("migration failed: {err}"),
                needs_configuration: false,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatus {
    pub name: String,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDiagnostics {
    /// Variable the primary store location came from.
    pub source_var: Option<String>,
    pub primary_available: bool,
    pub location_kind: Option<String>,
    pub connection_ok: bool,
    pub sqlite_version: Option<String>,
    pub schema_version: Option<u32>,
    pub latest_schema_version: u32,
    pub tables: Vec<TableStatus>,
    pub fallback_dir: String,
    pub fallback_read_only: bool,
    pub error: Option<String>,
}

/// Describes the configured primary store.
pub fn storage_diagnostics(config: &SiteConfig) -> StorageDiagnostics {
    let mut report = StorageDiagnostics {
        source_var: None,
        primary_available: config.primary_available(),
        location_kind: None,
        connection_ok: false,
        sqlite_version: None,
        schema_version: None,
        latest_schema_version: latest_version(),
        tables: Vec::new(),
        fallback_dir: config.content_dir.display().to_string(),
        fallback_read_only: config.read_only_fs,
        error: None,
    };

    let Some(database) = config.database.as_ref() else {
        report.error = Some("no database configured".to_string());
        return report;
    };
    report.source_var = Some(database.source_var.to_string());
    report.location_kind = Some(
        match database.location {
            DatabaseLocation::File(_) => "file",
            DatabaseLocation::Memory => "memory",
        }
        .to_string(),
    );

    match probe(&database.location, config) {
        Ok((sqlite_version, schema_version, tables)) => {
            report.connection_ok = true;
            report.sqlite_version = Some(sqlite_version);
            report.schema_version = Some(schema_version);
            report.tables = tables;
        }
        Err(err) => {
            report.error = Some(err.to_string());
        }
    }

    info!(
        "event=storage_diagnostics module=diagnostics status={} source_var={}",
        if report.connection_ok { "ok" } else { "error" },
        database.source_var
    );
    report
}

fn probe(
    location: &DatabaseLocation,
    config: &SiteConfig,
) -> rusqlite::Result<(String, u32, Vec<TableStatus>)> {
    let conn = match location {
        DatabaseLocation::File(path) => Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?,
        DatabaseLocation::Memory => Connection::open_in_memory()?,
    };
    conn.busy_timeout(config.storage_timeout)?;

    let sqlite_version: String = conn.query_row("SELECT sqlite_version();", [], |row| row.get(0))?;
    let schema_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;

    let mut tables = Vec::with_capacity(REQUIRED_TABLES.len());
    for name in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [name],
            |row| row.get(0),
        )?;
        tables.push(TableStatus {
            name: (*name).to_string(),
            exists: exists == 1,
        });
    }

    Ok((sqlite_version, schema_version, tables))
}
