//! Operator CLI for the studio content store.
//!
//! # Responsibility
//! - Run schema migrations and storage diagnostics from a shell.
//! - Read and write content slots and posts through the same repository the
//!   site uses, including the admin session check.

use clap::{Parser, Subcommand};
use log::error;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use studio_core::{
    init_logging, AdminAuthenticator, ContentRepository, ImageUpload, ImageUploader,
    LoggingConfig, NoopInvalidator, SiteConfig,
};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Manage studio site content and posts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the core library is linked
    Ping,

    /// Create or upgrade the primary database schema
    Migrate,

    /// Print storage diagnostics as JSON
    DbCheck,

    /// Print one content slot as JSON
    Get {
        /// Content key, e.g. `welcome` or `theme`
        key: String,
    },

    /// List blog posts, newest first
    Posts,

    /// Log in as the admin and print a session token
    Login {
        #[arg(long, env = "ADMIN_EMAIL")]
        email: String,

        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Replace one content slot with the JSON in a file
    Set {
        key: String,

        /// JSON file holding the new value
        #[arg(short, long)]
        file: PathBuf,

        /// Admin session token
        #[arg(short, long, env = "STUDIO_SESSION_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Upload an image and print its public URL
    Upload {
        path: PathBuf,

        /// Admin session token
        #[arg(short, long, env = "STUDIO_SESSION_TOKEN", hide_env_values = true)]
        token: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::from_env();
    if let Err(err) = init_logging(&logging.level, &logging.log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> CliResult {
    if let Commands::Ping = command {
        println!("studio_core ping={}", studio_core::ping());
        println!("studio_core version={}", studio_core::core_version());
        return Ok(());
    }

    let config = SiteConfig::from_env()?;
    let auth = Arc::new(AdminAuthenticator::from_config(&config));

    match command {
        Commands::Ping => Ok(()),
        Commands::Migrate => {
            let report = studio_core::migrate(&config);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.success {
                Ok(())
            } else {
                Err(report.message.into())
            }
        }
        Commands::DbCheck => {
            let report = studio_core::storage_diagnostics(&config);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Get { key } => {
            let repo = repository(&config, auth)?;
            match repo.read(&key)? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("null"),
            }
            Ok(())
        }
        Commands::Posts => {
            let repo = repository(&config, auth)?;
            for post in repo.list_posts()? {
                println!("{}\t{}\t{}", post.date, post.slug, post.title);
            }
            Ok(())
        }
        Commands::Login { email, password } => {
            let token = auth.login(&email, &password, now_secs())?;
            println!("{token}");
            Ok(())
        }
        Commands::Set { key, file, token } => {
            let raw = std::fs::read_to_string(&file)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            let repo = repository(&config, auth)?;
            repo.write(Some(&token), &key, &value)?;
            println!("saved {key} ({} backend)", repo.backend().as_str());
            Ok(())
        }
        Commands::Upload { path, token } => {
            let upload = ImageUpload {
                file_name: file_name_of(&path),
                content_type: content_type_for(&path).to_string(),
                bytes: std::fs::read(&path)?,
            };
            let uploader = ImageUploader::from_config(&config, auth)?;
            let stored = uploader.upload(Some(&token), Some(&upload), now_millis())?;
            println!("{}", stored.url);
            Ok(())
        }
    }
}

fn repository(
    config: &SiteConfig,
    auth: Arc<AdminAuthenticator>,
) -> Result<ContentRepository, Box<dyn Error>> {
    Ok(ContentRepository::from_config(
        config,
        auth,
        Arc::new(NoopInvalidator),
    )?)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
