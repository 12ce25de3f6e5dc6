use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Database connection parameters shared by all catalogs; the catalog
/// registry supplies the per-catalog database name.
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct DbConfig {
    #[validate(length(min = 1, message = "Database host cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, max = 65535, message = "Database port must be between 1 and 65535"))]
    pub port: u16,

    #[validate(length(min = 1, message = "Database user cannot be empty"))]
    pub user: String,

    #[serde(default)]
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "ermgate".to_string(),
            password: String::new(),
        }
    }
}

/// Server configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host address
    #[validate(length(min = 1, message = "HTTP host cannot be empty"))]
    pub http_host: String,

    /// HTTP server port (1-65535)
    #[validate(range(
        min = 1,
        max = 65535,
        message = "HTTP port must be between 1 and 65535"
    ))]
    pub http_port: u16,

    /// Default result limit applied when the request carries none
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "Default limit must be between 1 and 1000000"
    ))]
    pub default_limit: u64,

    /// Whether responses vary by client identity (cookie)
    pub vary_cookie: bool,

    /// Whether responses vary by content negotiation (accept)
    pub vary_accept: bool,

    /// Transient-failure retries inside the transaction envelope
    #[validate(range(max = 10, message = "Max retries must be at most 10"))]
    pub max_retries: u32,

    /// Path of the catalog registry YAML file
    #[validate(length(min = 1, message = "Registry path cannot be empty"))]
    pub registry_path: String,

    /// Maximum pooled connections per catalog
    #[validate(range(min = 1, max = 1024, message = "Pool size must be between 1 and 1024"))]
    pub pool_size: usize,

    #[validate(nested)]
    pub db: DbConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            default_limit: 100,
            vary_cookie: true,
            vary_accept: true,
            max_retries: 2,
            registry_path: "catalogs.yaml".to_string(),
            pool_size: 16,
            db: DbConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            http_host: env::var("ERMGATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: parse_env_var("ERMGATE_PORT", "8080")?,
            default_limit: parse_env_var("ERMGATE_DEFAULT_LIMIT", "100")?,
            vary_cookie: parse_env_var("ERMGATE_VARY_COOKIE", "true")?,
            vary_accept: parse_env_var("ERMGATE_VARY_ACCEPT", "true")?,
            max_retries: parse_env_var("ERMGATE_MAX_RETRIES", "2")?,
            registry_path: env::var("ERMGATE_REGISTRY")
                .unwrap_or_else(|_| "catalogs.yaml".to_string()),
            pool_size: parse_env_var("ERMGATE_POOL_SIZE", "16")?,
            db: DbConfig {
                host: env::var("PGHOST").unwrap_or_else(|_| "localhost".to_string()),
                port: parse_env_var("PGPORT", "5432")?,
                user: env::var("PGUSER").unwrap_or_else(|_| "ermgate".to_string()),
                password: env::var("PGPASSWORD").unwrap_or_default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments layered over the environment
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        config.http_host = cli.http_host;
        config.http_port = cli.http_port;
        if let Some(limit) = cli.default_limit {
            config.default_limit = limit;
        }
        if let Some(registry) = cli.registry {
            config.registry_path = registry;
        }
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub http_host: String,
    pub http_port: u16,
    pub default_limit: Option<u64>,
    pub registry: Option<String>,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
