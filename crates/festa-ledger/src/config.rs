//! # Ledger Configuration
//!
//! Configuration for the ledger service and the API server that hosts it.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FESTA_DATABASE_PATH=/var/lib/festa/ledger.db                       │
//! │     FESTA_JWT_SECRET=...                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $FESTA_CONFIG, or ./festa.toml                                     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "festa.db"
//! max_connections = 8
//! busy_timeout_ms = 250
//!
//! [retry]
//! max_attempts = 8
//! initial_backoff_ms = 5
//! max_backoff_ms = 200
//!
//! [qr]
//! label_attempts = 8
//!
//! [projector]
//! channel_capacity = 1024
//! rebuild_interval_secs = 0   # 0 = no periodic rebuild
//!
//! [auth]
//! jwt_secret = "change-me"
//! token_lifetime_secs = 43200
//!
//! [server]
//! bind_addr = "0.0.0.0"       # non-loopback requires a real auth.jwt_secret
//! port = 8080
//! ```

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use festa_core::qr::DEFAULT_LABEL_ATTEMPTS;
use festa_db::DbConfig;

use crate::error::{LedgerError, LedgerResult};

/// Placeholder secret shipped in defaults. Only accepted on a loopback bind.
const DEV_JWT_SECRET: &str = "festa-dev-secret";

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// SQLite lock wait before a write reports BUSY (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("festa.db")
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout() -> u64 {
    250
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Conflict retry settings.
///
/// A conflicting unit of work is dropped and re-executed from its first
/// read, waiting an exponentially growing, jittered interval in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    8
}
fn default_initial_backoff() -> u64 {
    5
}
fn default_max_backoff() -> u64 {
    200
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// =============================================================================
// QR Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrSettings {
    /// Collision retries per label before giving up.
    #[serde(default = "default_label_attempts")]
    pub label_attempts: u32,
}

fn default_label_attempts() -> u32 {
    DEFAULT_LABEL_ATTEMPTS
}

impl Default for QrSettings {
    fn default() -> Self {
        QrSettings {
            label_attempts: default_label_attempts(),
        }
    }
}

// =============================================================================
// Projector Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectorSettings {
    /// Bounded event channel size. A full channel drops the event with a
    /// warning; the next rebuild corrects the totals.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Periodic full rebuild. 0 disables it.
    #[serde(default)]
    pub rebuild_interval_secs: u64,
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for ProjectorSettings {
    fn default() -> Self {
        ProjectorSettings {
            channel_capacity: default_channel_capacity(),
            rebuild_interval_secs: 0,
        }
    }
}

// =============================================================================
// Auth Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret shared with the token issuer.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Lifetime of tokens minted by [`crate::auth::JwtManager::issue`].
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,
}

fn default_jwt_secret() -> String {
    DEV_JWT_SECRET.to_string()
}

fn default_token_lifetime() -> i64 {
    12 * 60 * 60
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: default_jwt_secret(),
            token_lifetime_secs: default_token_lifetime(),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// True when the server only listens on the local machine.
    pub fn is_loopback(&self) -> bool {
        self.bind_addr == "localhost"
            || self
                .bind_addr
                .parse::<IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false)
    }
}

// =============================================================================
// Main Ledger Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub qr: QrSettings,

    #[serde(default)]
    pub projector: ProjectorSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, else `$FESTA_CONFIG`, else `festa.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            info!(?path, "Loading ledger config from file");
            let contents = std::fs::read_to_string(&path)?;
            config = Self::from_toml_str(&contents)?;
        } else {
            debug!(?path, "Config file not found, using defaults");
        }

        config.apply_env_overrides();
        config.validate()?;

        if config.auth.jwt_secret == DEV_JWT_SECRET {
            warn!("Using the built-in development JWT secret; set FESTA_JWT_SECRET");
        }

        Ok(config)
    }

    /// Parses a TOML document. Missing sections take their defaults.
    pub fn from_toml_str(contents: &str) -> LedgerResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.database.max_connections == 0 {
            return Err(LedgerError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(LedgerError::InvalidConfig(
                "retry.max_attempts must be greater than 0".into(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(LedgerError::InvalidConfig(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }

        if self.qr.label_attempts == 0 {
            return Err(LedgerError::InvalidConfig(
                "qr.label_attempts must be greater than 0".into(),
            ));
        }

        if self.projector.channel_capacity == 0 {
            return Err(LedgerError::InvalidConfig(
                "projector.channel_capacity must be greater than 0".into(),
            ));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(LedgerError::InvalidConfig("auth.jwt_secret is empty".into()));
        }

        if self.auth.token_lifetime_secs <= 0 {
            return Err(LedgerError::InvalidConfig(
                "auth.token_lifetime_secs must be positive".into(),
            ));
        }

        if self.auth.jwt_secret == DEV_JWT_SECRET && !self.server.is_loopback() {
            return Err(LedgerError::InvalidConfig(format!(
                "server.bind_addr {} is not loopback; set auth.jwt_secret or FESTA_JWT_SECRET",
                self.server.bind_addr
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FESTA_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("FESTA_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid FESTA_MAX_CONNECTIONS"),
            }
        }

        if let Ok(attempts) = std::env::var("FESTA_RETRY_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => warn!(value = %attempts, "Ignoring invalid FESTA_RETRY_MAX_ATTEMPTS"),
            }
        }

        if let Ok(secs) = std::env::var("FESTA_REBUILD_INTERVAL_SECS") {
            if let Ok(n) = secs.parse::<u64>() {
                self.projector.rebuild_interval_secs = n;
            }
        }

        if let Ok(secret) = std::env::var("FESTA_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Ok(addr) = std::env::var("FESTA_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Ok(port) = std::env::var("FESTA_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                debug!(port = p, "Overriding server port from environment");
                self.server.port = p;
            }
        }
    }

    fn default_config_path() -> PathBuf {
        std::env::var("FESTA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("festa.toml"))
    }

    /// Pool configuration for [`festa_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    /// Projector periodic rebuild interval, if enabled.
    pub fn rebuild_interval(&self) -> Option<Duration> {
        match self.projector.rebuild_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.retry.max_attempts, 8);
        assert_eq!(config.qr.label_attempts, DEFAULT_LABEL_ATTEMPTS);
        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
        assert!(config.rebuild_interval().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [retry]
            max_attempts = 3

            [projector]
            rebuild_interval_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.max_backoff_ms, 200);
        assert_eq!(config.rebuild_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.database.path, PathBuf::from("festa.db"));
    }

    #[test]
    fn test_validation() {
        let mut config = LedgerConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.retry.initial_backoff_ms = 500;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.auth.jwt_secret = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dev_secret_only_on_loopback() {
        let mut config = LedgerConfig::default();
        config.server.bind_addr = "::1".to_string();
        assert!(config.validate().is_ok());

        config.server.bind_addr = "0.0.0.0".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfig(_)));

        config.auth.jwt_secret = "a-real-deployment-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("festa.toml");
        std::fs::write(&path, "[server]\nport = 9090\n").unwrap();

        let config = LedgerConfig::load(Some(path)).unwrap();
        assert!(config.server.port == 9090 || std::env::var("FESTA_PORT").is_ok());
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(LedgerConfig::from_toml_str("[retry]\nmax_attempts = \"many\"").is_err());
    }
}
