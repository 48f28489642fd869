use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::inference::CredentialSlot;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub dispatch: DispatchConfig,
    pub credentials: CredentialConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            dispatch: DispatchConfig::from_env()?,
            credentials: CredentialConfig::from_env(),
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Batch window and drain tuning for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Pending requests that trigger an immediate drain.
    pub batch_size: usize,
    /// Quiet period after the most recent submission before a drain.
    pub debounce: Duration,
    /// Maximum remote calls in flight at once.
    pub concurrency: usize,
    /// Pause between consecutive chunks of one batch.
    pub chunk_delay: Duration,
    /// Upper bound on a single remote call; `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            debounce: Duration::from_millis(2_000),
            concurrency: 3,
            chunk_delay: Duration::from_millis(1_000),
            call_timeout: Some(Duration::from_millis(60_000)),
        }
    }
}

impl DispatchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let batch_size = env_number("DISPATCH_BATCH_SIZE")?.unwrap_or(defaults.batch_size as u64);
        let concurrency =
            env_number("DISPATCH_CONCURRENCY")?.unwrap_or(defaults.concurrency as u64);
        let debounce = env_number("DISPATCH_DEBOUNCE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce);
        let chunk_delay = env_number("DISPATCH_CHUNK_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.chunk_delay);
        let call_timeout = match env_number("DISPATCH_CALL_TIMEOUT_MS")? {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.call_timeout,
        };

        let config = Self {
            batch_size: batch_size as usize,
            debounce,
            concurrency: concurrency as usize,
            chunk_delay,
            call_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidDispatch {
                reason: "DISPATCH_BATCH_SIZE must be at least 1",
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidDispatch {
                reason: "DISPATCH_CONCURRENCY must be at least 1",
            });
        }
        Ok(())
    }
}

/// Credential material for one slot. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Remote model settings and the per-slot keys.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub primary: Option<ApiKey>,
    pub secondary: Option<ApiKey>,
    pub tertiary: Option<ApiKey>,
    pub model: String,
    pub base_url: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            primary: None,
            secondary: None,
            tertiary: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl CredentialConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            primary: env_key("MODEL_API_KEY_PRIMARY"),
            secondary: env_key("MODEL_API_KEY_SECONDARY"),
            tertiary: env_key("MODEL_API_KEY_TERTIARY"),
            model: env::var("MODEL_NAME").unwrap_or(defaults.model),
            base_url: env::var("MODEL_BASE_URL").unwrap_or(defaults.base_url),
        }
    }

    pub fn key(&self, slot: CredentialSlot) -> Option<&ApiKey> {
        match slot {
            CredentialSlot::Primary => self.primary.as_ref(),
            CredentialSlot::Secondary => self.secondary.as_ref(),
            CredentialSlot::Tertiary => self.tertiary.as_ref(),
        }
    }
}

fn env_key(name: &str) -> Option<ApiKey> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(ApiKey)
}

fn env_number(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidDispatch { reason: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
            ConfigError::InvalidDispatch { reason } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidDispatch { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "DISPATCH_BATCH_SIZE",
            "DISPATCH_DEBOUNCE_MS",
            "DISPATCH_CONCURRENCY",
            "DISPATCH_CHUNK_DELAY_MS",
            "DISPATCH_CALL_TIMEOUT_MS",
            "MODEL_API_KEY_PRIMARY",
            "MODEL_API_KEY_SECONDARY",
            "MODEL_API_KEY_TERTIARY",
            "MODEL_NAME",
            "MODEL_BASE_URL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.dispatch, DispatchConfig::default());
        assert!(config.credentials.primary.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn reads_dispatch_tuning_and_disables_timeout_on_zero() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DISPATCH_BATCH_SIZE", "10");
        env::set_var("DISPATCH_DEBOUNCE_MS", "250");
        env::set_var("DISPATCH_CONCURRENCY", "4");
        env::set_var("DISPATCH_CHUNK_DELAY_MS", "0");
        env::set_var("DISPATCH_CALL_TIMEOUT_MS", "0");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.dispatch.batch_size, 10);
        assert_eq!(config.dispatch.debounce, Duration::from_millis(250));
        assert_eq!(config.dispatch.concurrency, 4);
        assert_eq!(config.dispatch.chunk_delay, Duration::ZERO);
        assert_eq!(config.dispatch.call_timeout, None);
        reset_env();
    }

    #[test]
    fn rejects_zero_concurrency() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DISPATCH_CONCURRENCY", "0");
        let err = AppConfig::load().expect_err("zero concurrency is invalid");
        assert!(matches!(err, ConfigError::InvalidDispatch { .. }));
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_batch_size() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DISPATCH_BATCH_SIZE", "many");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { key }) => assert_eq!(key, "DISPATCH_BATCH_SIZE"),
            other => panic!("expected invalid number, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn blank_keys_leave_slot_empty_and_debug_redacts() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MODEL_API_KEY_PRIMARY", "secret-primary");
        env::set_var("MODEL_API_KEY_SECONDARY", "   ");
        let config = AppConfig::load().expect("config loads");
        assert!(config.credentials.key(CredentialSlot::Primary).is_some());
        assert!(config.credentials.key(CredentialSlot::Secondary).is_none());
        let rendered = format!("{:?}", config.credentials);
        assert!(!rendered.contains("secret-primary"));
        reset_env();
    }
}
