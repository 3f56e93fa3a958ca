use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// sqlx connection string for the SQLite database
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5005
}

fn default_database_url() -> String {
    "sqlite:./data/fastrack.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify bearer tokens
    pub jwt_secret: Option<String>,
    /// Token lifetime in seconds (default: 7 days)
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

fn default_token_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. Empty means any origin.
    #[serde(default)]
    pub origins: Vec<String>,
}

impl CorsConfig {
    /// Parse a comma separated origin list, dropping blanks.
    pub fn parse_origins(list: &str) -> Vec<String> {
        list.split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Requests allowed per window on /auth endpoints
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Key clients by the proxy-appended forwarding headers instead of the
    /// peer address. Only enable behind a reverse proxy.
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth_requests_per_window: default_auth_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
            trust_proxy: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_auth_requests() -> u32 {
    100
}

fn default_window_seconds() -> u64 {
    15 * 60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values taken from the command line or environment that win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub cors_origins: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(url) = overrides.database_url {
            self.server.database_url = url;
        }
        if let Some(secret) = overrides.jwt_secret {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(origins) = overrides.cors_origins {
            self.cors.origins = CorsConfig::parse_origins(&origins);
        }
    }

    /// The signing secret, or an error naming the missing setting.
    pub fn jwt_secret(&self) -> Result<&str> {
        self.auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .context("JWT_SECRET not configured (set [auth].jwt_secret or JWT_SECRET)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5005);
        assert_eq!(config.auth.token_ttl_secs, 604_800);
        assert_eq!(config.rate_limit.auth_requests_per_window, 100);
        assert_eq!(config.rate_limit.window_seconds, 900);
        assert!(!config.rate_limit.trust_proxy);
        assert!(config.cors.origins.is_empty());
        assert!(config.jwt_secret().is_err());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [server]
            port = 6000

            [auth]
            jwt_secret = "s3cret"
            token_ttl_secs = 60

            [rate_limit]
            trust_proxy = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.jwt_secret().unwrap(), "s3cret");
        assert_eq!(config.auth.token_ttl_secs, 60);
        assert_eq!(config.logging.level, "info");
        assert!(config.rate_limit.trust_proxy);
        assert_eq!(config.rate_limit.auth_requests_per_window, 100);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::parse("[server]\nport = 6000\n").unwrap();
        config.apply(Overrides {
            port: Some(7000),
            database_url: Some("sqlite::memory:".to_string()),
            jwt_secret: Some("env-secret".to_string()),
            cors_origins: Some("https://a.example, ,https://b.example".to_string()),
        });

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.database_url, "sqlite::memory:");
        assert_eq!(config.jwt_secret().unwrap(), "env-secret");
        assert_eq!(
            config.cors.origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_empty_secret_is_missing() {
        let config = Config::parse("[auth]\njwt_secret = \"\"\n").unwrap();
        assert!(config.jwt_secret().is_err());
    }
}
