//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `FOODGRAM_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `FOODGRAM_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `FOODGRAM_DATABASE__POOL__MAX_CONNECTIONS=20` sets `database.pool.max_connections`.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use foodgram::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! FOODGRAM_PORT=8080
//!
//! # Set database connection (preferred method)
//! DATABASE_URL="postgresql://foodgram:foodgram@db/foodgram"
//!
//! # Secret key and allowed hosts for production
//! FOODGRAM_SECRET_KEY="change-me"
//! FOODGRAM_ALLOWED_HOSTS='["foodgram.example.com"]'
//! FOODGRAM_PUBLIC_URL="https://foodgram.example.com"
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FOODGRAM_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
/// `Debug` masks secrets and database passwords, since the config is logged at startup.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Externally visible base URL, used for media URLs, short links and pagination links
    pub public_url: Url,
    /// Shortcut for `database.url`, usually populated from `DATABASE_URL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// PostgreSQL connection settings
    pub database: DatabaseConfig,
    /// Secret used to key auth token digests (required unless `debug` is set)
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    /// Development mode: relaxes secret and host checks
    pub debug: bool,
    /// Host header values accepted by the server. `*` accepts any host.
    pub allowed_hosts: Vec<String>,
    /// Directory uploaded images are written to and served from at `/media`
    pub media_root: PathBuf,
    /// Optional directory holding the compiled front-end (served with SPA fallback)
    pub static_dir: Option<PathBuf>,
    /// Maximum accepted request body size in bytes (base64 images are large)
    pub max_body_bytes: usize,
    /// Page size defaults for paginated list endpoints
    pub pagination: PaginationConfig,
    /// Password hashing and policy
    pub password: PasswordConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Email for an administrator account ensured at startup
    pub admin_email: Option<String>,
    /// Password for the administrator account (required when `admin_email` is set)
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
}

/// Database connection configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string for the main database
    pub url: String,
    /// Connection pool settings
    pub pool: PoolSettings,
    /// Delay between connection attempts while waiting for the database at startup
    #[serde(with = "humantime_serde")]
    pub connect_retry_interval: Duration,
    /// Give up after this many failed attempts (0 = wait forever)
    pub connect_max_attempts: u32,
}

/// Individual pool configuration with SQLx parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

const REDACTED: &str = "[redacted]";

/// Mask the password of a connection string; unparseable strings are hidden entirely
fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some(REDACTED));
            }
            url.to_string()
        }
        Err(_) => REDACTED.to_string(),
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("public_url", &self.public_url.as_str())
            .field("database_url", &self.database_url.as_deref().map(redact_database_url))
            .field("database", &self.database)
            .field("secret_key", &self.secret_key.as_ref().map(|_| REDACTED))
            .field("debug", &self.debug)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("media_root", &self.media_root)
            .field("static_dir", &self.static_dir)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("pagination", &self.pagination)
            .field("password", &self.password)
            .field("cors", &self.cors)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &self.admin_password.as_ref().map(|_| REDACTED))
            .finish()
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &redact_database_url(&self.url))
            .field("pool", &self.pool)
            .field("connect_retry_interval", &self.connect_retry_interval)
            .field("connect_max_attempts", &self.connect_max_attempts)
            .finish()
    }
}

/// Pagination defaults, shared by every paginated endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaginationConfig {
    /// Page size used when `limit` is not given
    pub default_limit: i64,
    /// Upper bound for the `limit` query parameter
    pub max_limit: i64,
}

/// Password hashing parameters and policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB, secure for production)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations (default: 2, secure for production)
    pub argon2_iterations: u32,
    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// Allowed CORS origin.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://foodgram.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_url: Url::parse("http://localhost:8000").expect("static URL is valid"),
            database_url: None,
            database: DatabaseConfig::default(),
            secret_key: None,
            debug: false,
            allowed_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            media_root: PathBuf::from("media"),
            static_dir: None,
            max_body_bytes: 20 * 1024 * 1024,
            pagination: PaginationConfig::default(),
            password: PasswordConfig::default(),
            cors: CorsConfig::default(),
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/foodgram".to_string(),
            pool: PoolSettings::default(),
            connect_retry_interval: Duration::from_secs(2),
            connect_max_attempts: 0,
        }
    }
}

impl Default for PoolSettings {
    /// Production defaults: balanced for reliability and resource usage
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 6,
            max_limit: 100,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            // Secure defaults for production (Argon2id RFC recommendations)
            argon2_memory_kib: 19456, // 19 MB
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Url(
                Url::parse("http://localhost:3000").expect("static URL is valid"), // Development frontend
            )],
            allow_credentials: false,
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

/// Key used to digest auth tokens when running in debug mode without a secret
const DEBUG_SECRET_KEY: &str = "foodgram-insecure-debug-key";

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // DATABASE_URL wins over the nested setting, pool settings are kept
        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if !self.debug && self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Internal {
                operation: "Config validation: secret_key is not configured. \
                     Set FOODGRAM_SECRET_KEY or enable debug mode for local development."
                    .to_string(),
            });
        }

        if self.pagination.default_limit < 1 {
            return Err(Error::Internal {
                operation: "Config validation: pagination.default_limit must be at least 1".to_string(),
            });
        }

        if self.pagination.default_limit > self.pagination.max_limit {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: pagination.default_limit ({}) cannot be greater than pagination.max_limit ({})",
                    self.pagination.default_limit, self.pagination.max_limit
                ),
            });
        }

        if self.password.min_length < 1 || self.password.min_length > self.password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) must be between 1 and max_length ({})",
                    self.password.min_length, self.password.max_length
                ),
            });
        }

        if self.admin_email.is_some() && self.admin_password.is_none() {
            return Err(Error::Internal {
                operation: "Config validation: admin_email is set but admin_password is missing".to_string(),
            });
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        if self.public_url.cannot_be_a_base() {
            return Err(Error::Internal {
                operation: format!("Config validation: public_url '{}' cannot be used as a base URL", self.public_url),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            // (FOODGRAM_CONFIG is the file path itself, consumed by clap)
            .merge(Env::prefixed("FOODGRAM_").ignore(&["config"]).split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Key for auth token digests
    pub fn token_key(&self) -> &str {
        match self.secret_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => DEBUG_SECRET_KEY,
        }
    }

    /// Check a Host header value (with or without port) against `allowed_hosts`
    pub fn is_host_allowed(&self, host: &str) -> bool {
        let hostname = strip_port(host);
        if self.allowed_hosts.is_empty() {
            return self.debug && matches!(hostname, "localhost" | "127.0.0.1" | "[::1]");
        }
        self.allowed_hosts.iter().any(|allowed| {
            if allowed == "*" {
                true
            } else if let Some(suffix) = allowed.strip_prefix('.') {
                // ".example.com" matches example.com and any subdomain
                hostname.eq_ignore_ascii_case(suffix)
                    || hostname.len() > suffix.len() + 1
                        && hostname.to_ascii_lowercase().ends_with(&format!(".{}", suffix.to_ascii_lowercase()))
            } else {
                hostname.eq_ignore_ascii_case(allowed)
            }
        })
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal, keep the brackets
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}
