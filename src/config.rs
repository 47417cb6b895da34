use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub staging_dir: String,
    pub database_url: String,
    pub public_url: String,
    pub signing_secret: String,
    pub presign_ttl_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Travel-agency image gallery backend")]
pub struct Args {
    /// Host to bind to (overrides GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GALLERY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where object payloads are stored (overrides GALLERY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Directory where multipart uploads are staged (overrides GALLERY_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<String>,

    /// Database URL (overrides GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL presigned links are built against (overrides GALLERY_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Secret for presigned-URL signatures (overrides GALLERY_SIGNING_SECRET)
    #[arg(long)]
    pub signing_secret: Option<String>,

    /// Presigned URL lifetime in seconds (overrides GALLERY_PRESIGN_TTL_SECS)
    #[arg(long)]
    pub presign_ttl_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("GALLERY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("GALLERY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing GALLERY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading GALLERY_PORT"),
        };
        let env_storage =
            env::var("GALLERY_STORAGE_DIR").unwrap_or_else(|_| "./data/buckets".into());
        let env_staging =
            env::var("GALLERY_STAGING_DIR").unwrap_or_else(|_| "./data/uploads".into());
        let env_db = env::var("GALLERY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/gallery.db".into());
        let env_public =
            env::var("GALLERY_PUBLIC_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".into());
        let env_secret = env::var("GALLERY_SIGNING_SECRET")
            .unwrap_or_else(|_| "dev-only-signing-secret".into());
        let env_ttl = match env::var("GALLERY_PRESIGN_TTL_SECS") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| format!("parsing GALLERY_PRESIGN_TTL_SECS value `{}`", value))?,
            Err(env::VarError::NotPresent) => {
                crate::services::object_store::DEFAULT_PRESIGN_TTL_SECS
            }
            Err(err) => return Err(err).context("reading GALLERY_PRESIGN_TTL_SECS"),
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            staging_dir: args.staging_dir.unwrap_or(env_staging),
            database_url: args.database_url.unwrap_or(env_db),
            public_url: args.public_url.unwrap_or(env_public),
            signing_secret: args.signing_secret.unwrap_or(env_secret),
            presign_ttl_secs: args.presign_ttl_secs.unwrap_or(env_ttl),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
