use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

/// Ollama generation endpoint configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration for model calls
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Pipeline tuning: cache size, rate limiting, and context fetch limits
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cache_capacity: usize,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
    pub history_limit: u32,
    pub feedback_limit: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let ollama = OllamaConfig {
            base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "gemma3:4b".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/bridge.db".to_string()),
            ),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 60_000),
            max_retries: env_parse("MAX_RETRIES", 2),
            retry_delay_ms: env_parse("RETRY_DELAY_MS", 500),
        };

        let pipeline = PipelineConfig {
            cache_capacity: env_parse("CACHE_CAPACITY", 32),
            rate_limit_max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", 10),
            rate_limit_window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", 60),
            history_limit: env_parse("HISTORY_LIMIT", 3),
            feedback_limit: env_parse("FEEDBACK_LIMIT", 5),
        };

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|_| AppError::Config {
                message: "BIND_ADDR is not a valid socket address".to_string(),
            })?;

        Ok(Config {
            ollama,
            database,
            logging,
            request,
            pipeline,
            server: ServerConfig { bind_addr },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 32,
            rate_limit_max_requests: 10,
            rate_limit_window_secs: 60,
            history_limit: 3,
            feedback_limit: 5,
        }
    }
}
