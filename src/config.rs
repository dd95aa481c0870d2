use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    /// Enables the metadata mirror when set.
    pub database_url: Option<String>,
    pub public_url: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Two-phase blob storage service")]
pub struct Args {
    /// Host to bind to (overrides BLOB_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BLOB_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Root directory of the shard tree (overrides BLOB_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// SQLite URL of the metadata mirror (overrides BLOB_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL used in links handed to clients (overrides BLOB_STORE_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Apply the mirror schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args, |name| env::var(name))?, migrate))
    }

    /// Layer `args` over the variables returned by `lookup`.
    pub fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = lookup("BLOB_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match lookup("BLOB_STORE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing BLOB_STORE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 2332,
            Err(err) => return Err(err).context("reading BLOB_STORE_PORT"),
        };
        let env_storage =
            lookup("BLOB_STORE_STORAGE_DIR").unwrap_or_else(|_| "./data/storage".into());
        let env_db = lookup("BLOB_STORE_DATABASE_URL").ok();
        let env_public = lookup("BLOB_STORE_PUBLIC_URL").ok();

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.or(env_db).filter(|s| !s.is_empty()),
            public_url: args.public_url.or(env_public).filter(|s| !s.is_empty()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
