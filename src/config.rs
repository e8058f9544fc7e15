use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::env;

/// Which backend holds the raw bytes of uploaded files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// Flat files beneath a configured directory.
    Local,
    /// An S3-compatible bucket.
    S3,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub backend: StorageKind,
    pub upload_dir: String,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "CSV file ingestion and retrieval API")]
pub struct Args {
    /// Host to bind to (overrides CSV_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CSV_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides CSV_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Storage backend for uploaded bytes (overrides CSV_STORE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<StorageKind>,

    /// Directory the local backend stores uploads in (overrides CSV_STORE_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("CSV_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("CSV_STORE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing CSV_STORE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading CSV_STORE_PORT"),
        };
        let env_db = env::var("CSV_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/csv_store.db".into());
        let env_backend = match env::var("CSV_STORE_BACKEND") {
            Ok(value) => StorageKind::from_str(&value, true).map_err(|err| {
                anyhow::anyhow!("parsing CSV_STORE_BACKEND value `{}`: {}", value, err)
            })?,
            Err(env::VarError::NotPresent) => StorageKind::Local,
            Err(err) => return Err(err).context("reading CSV_STORE_BACKEND"),
        };
        let env_upload =
            env::var("CSV_STORE_UPLOAD_DIR").unwrap_or_else(|_| "./data/uploads".into());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            backend: args.backend.unwrap_or(env_backend),
            upload_dir: args.upload_dir.unwrap_or(env_upload),
            // The S3 backend reads the SDK's conventional variable names.
            // Whether required values are present is checked where they are
            // consumed, at backend construction.
            s3_bucket: env::var("AWS_S3_BUCKET").ok(),
            s3_region: env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".into()),
            s3_endpoint: env::var("AWS_S3_ENDPOINT_URL").ok(),
            s3_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            s3_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
