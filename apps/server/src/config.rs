use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub stats: StatsConfig,
    pub bootstrap_project: Option<String>,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

/// Limits and policy knobs for the ingestion path
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Cap on the raw request body, before decompression
    pub max_payload_bytes: usize,
    /// Cap on the body after decompression
    pub max_decompressed_bytes: usize,
    /// Sniff gzip on octet-stream bodies that declare no Content-Encoding
    pub speculative_decompression: bool,
    /// Number of stack frames that take part in the default fingerprint
    pub fingerprint_frame_depth: usize,
}

/// Stats aggregation defaults
#[derive(Debug, Clone)]
pub struct StatsConfig {
    pub default_window_days: u32,
    pub max_window_days: u32,
    pub top_issues: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            database: DatabaseConfig::from_env()?,
            ingest: IngestConfig::from_env(),
            stats: StatsConfig::from_env(),
            bootstrap_project: env::var("BOOTSTRAP_PROJECT")
                .ok()
                .filter(|name| !name.trim().is_empty()),
        })
    }
}

/// Reads a variable, falling back to the default when unset or unparseable
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", 1),
            acquire_timeout: Duration::from_secs(env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)),
            idle_timeout: Duration::from_secs(env_or("DATABASE_IDLE_TIMEOUT_SECS", 600)),
            max_lifetime: Duration::from_secs(env_or("DATABASE_MAX_LIFETIME_SECS", 1800)),
        })
    }
}

impl IngestConfig {
    pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;
    pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 10 * 1024 * 1024;
    pub const DEFAULT_FRAME_DEPTH: usize = 5;

    /// Load ingestion limits from environment variables
    pub fn from_env() -> Self {
        Self {
            max_payload_bytes: env_or("MAX_PAYLOAD_BYTES", Self::DEFAULT_MAX_PAYLOAD_BYTES),
            max_decompressed_bytes: env_or(
                "MAX_DECOMPRESSED_BYTES",
                Self::DEFAULT_MAX_DECOMPRESSED_BYTES,
            ),
            speculative_decompression: env::var("SPECULATIVE_DECOMPRESSION")
                .map(|v| !matches!(v.trim(), "false" | "0"))
                .unwrap_or(true),
            fingerprint_frame_depth: env_or("FINGERPRINT_FRAME_DEPTH", Self::DEFAULT_FRAME_DEPTH),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: Self::DEFAULT_MAX_PAYLOAD_BYTES,
            max_decompressed_bytes: Self::DEFAULT_MAX_DECOMPRESSED_BYTES,
            speculative_decompression: true,
            fingerprint_frame_depth: Self::DEFAULT_FRAME_DEPTH,
        }
    }
}

impl StatsConfig {
    /// Load stats defaults from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_window_days = env_or("STATS_MAX_WINDOW_DAYS", defaults.max_window_days).max(1);
        Self {
            default_window_days: env_or("STATS_DEFAULT_WINDOW_DAYS", defaults.default_window_days)
                .clamp(1, max_window_days),
            max_window_days,
            top_issues: env_or("STATS_TOP_ISSUES", defaults.top_issues),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            default_window_days: 14,
            max_window_days: 90,
            top_issues: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PORT must be a valid number")]
    InvalidPort,
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,
}
