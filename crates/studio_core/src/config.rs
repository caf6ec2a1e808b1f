//! Environment-driven site configuration.
//!
//! # Responsibility
//! - Decide whether the primary store is configured (pure lookup, no I/O).
//! - Collect fallback paths, session secret, admin credentials and blob
//!   storage settings in one typed snapshot.
//!
//! # Invariants
//! - `SiteConfig::database.is_some()` is the single availability signal for
//!   the primary store.
//! - Secrets never appear in `Debug` output.

use log::warn;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

/// Variables checked, in order, for the primary store location.
pub const DATABASE_URL_VARS: &[&str] = &["STUDIO_DATABASE_URL", "DATABASE_URL"];

const DEFAULT_CONTENT_DIR: &str = "content";
const DEFAULT_UPLOADS_DIR: &str = "public/uploads";
const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BLOB_STORE_URL: &str = "https://blob.vercel-storage.com";
const DEV_SESSION_SECRET: &str = "default-secret-change-in-production";

/// Configuration parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Where the primary SQLite store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl DatabaseLocation {
    /// Parses `sqlite://path`, `sqlite:path`, `:memory:` or a plain path.
    ///
    /// Any other `scheme://` URL is refused; blank input is `Ok(None)`.
    pub fn parse(raw: &str) -> Result<Option<Self>, UnsupportedScheme> {
        let trimmed = raw.trim();
        let path = match trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
        {
            Some(path) => path,
            None => {
                if let Some((scheme, _)) = trimmed.split_once("://") {
                    return Err(UnsupportedScheme(scheme.to_ascii_lowercase()));
                }
                trimmed
            }
        };
        Ok(match path {
            "" => None,
            ":memory:" => Some(Self::Memory),
            other => Some(Self::File(PathBuf::from(other))),
        })
    }
}

/// A database URL whose scheme this store cannot open, e.g. `postgres`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedScheme(pub String);

/// Primary store settings, present only when configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,
    /// Environment variable that supplied the location.
    pub source_var: &'static str,
}

/// Single admin credential pair.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl Debug for AdminCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote blob store settings.
#[derive(Clone, PartialEq, Eq)]
pub struct BlobStoreConfig {
    pub token: String,
    pub endpoint: String,
    /// Public host of stored objects when the store's answer lacks a URL.
    pub public_base_url: Option<String>,
}

impl Debug for BlobStoreConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStoreConfig")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

/// Full configuration snapshot for one process.
#[derive(Clone)]
pub struct SiteConfig {
    pub database: Option<DatabaseConfig>,
    pub content_dir: PathBuf,
    /// The deployment filesystem rejects writes (hosted serverless).
    pub read_only_fs: bool,
    pub storage_timeout: Duration,
    pub session_secret: String,
    pub session_secret_is_default: bool,
    pub admin: Option<AdminCredentials>,
    pub blob: Option<BlobStoreConfig>,
    pub uploads_dir: PathBuf,
    /// Issue `Secure` session cookies.
    pub production: bool,
}

impl Debug for SiteConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteConfig")
            .field("database", &self.database)
            .field("content_dir", &self.content_dir)
            .field("read_only_fs", &self.read_only_fs)
            .field("storage_timeout", &self.storage_timeout)
            .field("session_secret", &"<redacted>")
            .field("session_secret_is_default", &self.session_secret_is_default)
            .field("admin", &self.admin)
            .field("blob", &self.blob)
            .field("uploads_dir", &self.uploads_dir)
            .field("production", &self.production)
            .finish()
    }
}

impl SiteConfig {
    /// Loads `.env` (when present) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut database = None;
        for &var in DATABASE_URL_VARS {
            let Some(raw) = get(var) else {
                continue;
            };
            match DatabaseLocation::parse(&raw) {
                Ok(Some(location)) => {
                    database = Some(DatabaseConfig {
                        location,
                        source_var: var,
                    });
                    break;
                }
                Ok(None) => {}
                // The rest of the URL may hold credentials.
                Err(UnsupportedScheme(scheme)) => {
                    return Err(ConfigError::InvalidValue {
                        key: var,
                        value: format!("{scheme}://..."),
                        reason: "only sqlite database locations are supported",
                    })
                }
            }
        }

        let hosted = get("VERCEL").is_some();
        let read_only_fs = hosted || parse_flag(get("STUDIO_READ_ONLY_FS"), "STUDIO_READ_ONLY_FS")?;

        let storage_timeout = match get("STUDIO_STORAGE_TIMEOUT_MS") {
            Some(raw) => {
                let millis = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: "STUDIO_STORAGE_TIMEOUT_MS",
                    value: raw.clone(),
                    reason: "expected a whole number of milliseconds",
                })?;
                if millis == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "STUDIO_STORAGE_TIMEOUT_MS",
                        value: raw,
                        reason: "timeout must be greater than zero",
                    });
                }
                Duration::from_millis(millis)
            }
            None => Duration::from_millis(DEFAULT_STORAGE_TIMEOUT_MS),
        };

        let (session_secret, session_secret_is_default) = match get("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => {
                warn!("event=config_load module=config status=warn reason=default_session_secret");
                (DEV_SESSION_SECRET.to_string(), true)
            }
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminCredentials { email, password }),
            _ => None,
        };

        let blob = get("BLOB_READ_WRITE_TOKEN").map(|token| {
            let endpoint = get("BLOB_STORE_URL")
                .unwrap_or_else(|| DEFAULT_BLOB_STORE_URL.to_string())
                .trim_end_matches('/')
                .to_string();
            let public_base_url =
                get("BLOB_PUBLIC_BASE_URL").map(|url| url.trim_end_matches('/').to_string());
            BlobStoreConfig {
                token,
                endpoint,
                public_base_url,
            }
        });

        let production = hosted
            || get("STUDIO_ENV")
                .map(|value| value.trim().eq_ignore_ascii_case("production"))
                .unwrap_or(false);

        Ok(Self {
            database,
            content_dir: get("STUDIO_CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR)),
            read_only_fs,
            storage_timeout,
            session_secret,
            session_secret_is_default,
            admin,
            blob,
            uploads_dir: get("STUDIO_UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOADS_DIR)),
            production,
        })
    }

    /// Whether the primary store is configured. Pure configuration check.
    pub fn primary_available(&self) -> bool {
        self.database.is_some()
    }
}

fn parse_flag(value: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw,
            reason: "expected a boolean flag",
        }),
    }
}
