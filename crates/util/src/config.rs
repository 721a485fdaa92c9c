use std::{env, fmt, net::SocketAddr, time::Duration};

use url::Url;

use super::server_bind_address;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SSE_HEARTBEAT_SECS: u64 = 20;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1800;
pub const DEFAULT_SESSION_SWEEP_SECS: u64 = 60;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Connection settings for the warehouse API.
#[derive(Debug, Clone)]
pub struct WarehouseApiConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub warehouse_api: WarehouseApiConfig,
    pub sse_heartbeat: Duration,
    /// Idle time after which an unsubscribed session is closed.
    pub session_ttl: Duration,
    pub session_sweep_interval: Duration,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("RACK_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let raw_url =
            env::var("WAREHOUSE_API_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        let base_url = parse_base_url(&raw_url)?;
        let token = env::var("WAREHOUSE_API_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let timeout = read_secs("WAREHOUSE_API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS)?;
        let sse_heartbeat = read_secs("RACK_SSE_HEARTBEAT_SECS", DEFAULT_SSE_HEARTBEAT_SECS)?;
        let session_ttl = read_secs("RACK_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        let session_sweep_interval =
            read_secs("RACK_SESSION_SWEEP_SECS", DEFAULT_SESSION_SWEEP_SECS)?;

        Ok(Self {
            bind_addr,
            environment,
            warehouse_api: WarehouseApiConfig {
                base_url,
                token,
                timeout,
            },
            sse_heartbeat,
            session_ttl,
            session_sweep_interval,
        })
    }
}

/// Parses the API base URL, appending the trailing slash relative joins need.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let value = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&value).map_err(|err| ConfigError::InvalidApiUrl(value.clone(), err))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidApiUrl(
            value,
            url::ParseError::RelativeUrlWithCannotBeABaseBase,
        ));
    }
    Ok(url)
}

fn read_secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidSeconds { name, value: raw }),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    InvalidApiUrl(String, url::ParseError),
    InvalidSeconds { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "RACK_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid RACK_BIND_ADDR value: {err}"),
            Self::InvalidApiUrl(value, err) => {
                write!(f, "invalid WAREHOUSE_API_URL value '{value}': {err}")
            }
            Self::InvalidSeconds { name, value } => {
                write!(f, "{name} must be a positive number of seconds (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
