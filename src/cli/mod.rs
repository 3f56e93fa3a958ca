//! Command-line interface.
//!
//! With no subcommand the API server starts. `seed` resets the demo account
//! and exits.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "fastrack")]
#[command(author, version, about = "Intermittent fasting tracker API", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "fastrack.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// sqlx SQLite connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Secret used to sign bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Comma separated list of allowed CORS origins
    #[arg(long, env = "CORS_ORIGINS")]
    pub cors_origins: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Create or reset the demo account with sample sessions
    Seed,
}

impl Cli {
    /// Settings that win over the configuration file
    pub fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            database_url: self.database_url.clone(),
            jwt_secret: self.jwt_secret.clone(),
            cors_origins: self.cors_origins.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_with_overrides() {
        let cli = Cli::try_parse_from([
            "fastrack",
            "--config",
            "other.toml",
            "--port",
            "6000",
            "--database-url",
            "sqlite::memory:",
            "seed",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(cli.command, Some(Commands::Seed));

        let overrides = cli.overrides();
        assert_eq!(overrides.port, Some(6000));
        assert_eq!(overrides.database_url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Cli::try_parse_from(["fastrack", "--port", "http"]).is_err());
    }
}
