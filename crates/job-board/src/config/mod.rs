use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::hiring::notifications::{
    AckPolicy, RetryBackoff, WorkerConfig, MAX_RECEIVE_BATCH, MAX_RECEIVE_WAIT,
};

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
    pub queue: QueueConfig,
    pub worker: WorkerSettings,
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

        let batch_size = parse_var("APP_QUEUE_BATCH_SIZE", MAX_RECEIVE_BATCH)?;
        if !(1..=MAX_RECEIVE_BATCH).contains(&batch_size) {
            return Err(ConfigError::OutOfRange {
                key: "APP_QUEUE_BATCH_SIZE",
                expected: "between 1 and 10",
            });
        }

        let wait_seconds = parse_var("APP_QUEUE_WAIT_SECONDS", MAX_RECEIVE_WAIT.as_secs())?;
        if wait_seconds > MAX_RECEIVE_WAIT.as_secs() {
            return Err(ConfigError::OutOfRange {
                key: "APP_QUEUE_WAIT_SECONDS",
                expected: "at most 20",
            });
        }

        let visibility_seconds = parse_var("APP_QUEUE_VISIBILITY_SECONDS", 30u64)?;

        let ack_policy = match env::var("APP_WORKER_ACK_POLICY") {
            Ok(raw) => AckPolicy::parse(&raw).ok_or(ConfigError::InvalidAckPolicy(raw))?,
            Err(_) => AckPolicy::Always,
        };

        let instances = parse_var("APP_WORKER_INSTANCES", 1usize)?;
        if instances == 0 {
            return Err(ConfigError::OutOfRange {
                key: "APP_WORKER_INSTANCES",
                expected: "at least 1",
            });
        }

        let max_receives = match env::var("APP_WORKER_MAX_RECEIVES") {
            Ok(raw) => Some(raw.trim().parse::<u32>().map_err(|_| {
                ConfigError::InvalidNumber {
                    key: "APP_WORKER_MAX_RECEIVES",
                    value: raw.clone(),
                }
            })?),
            Err(_) => None,
        };
        if max_receives == Some(0) {
            return Err(ConfigError::OutOfRange {
                key: "APP_WORKER_MAX_RECEIVES",
                expected: "at least 1",
            });
        }

        let retry_initial_ms = parse_var("APP_RETRY_INITIAL_MS", 200u64)?;
        let retry_max_ms = parse_var("APP_RETRY_MAX_MS", 30_000u64)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            queue: QueueConfig {
                batch_size,
                wait_time: Duration::from_secs(wait_seconds),
                visibility_timeout: Duration::from_secs(visibility_seconds),
            },
            worker: WorkerSettings {
                instances,
                ack_policy,
                max_receives,
                retry: RetryBackoff::exponential(
                    Duration::from_millis(retry_initial_ms),
                    Duration::from_millis(retry_max_ms.max(retry_initial_ms)),
                ),
            },
        })
    }

    /// Worker configuration for the `index`-th consumer instance.
    pub fn worker_config(&self, index: usize) -> WorkerConfig {
        WorkerConfig {
            name: format!("notification-worker-{index}"),
            batch_size: self.queue.batch_size,
            wait_time: self.queue.wait_time,
            ack_policy: self.worker.ack_policy,
            max_receives: self.worker.max_receives,
            retry: self.worker.retry,
        }
    }
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Receive parameters and delivery lease for the notification queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub wait_time: Duration,
    pub visibility_timeout: Duration,
}

/// How the notification consumers are run.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub instances: usize,
    pub ack_policy: AckPolicy,
    pub max_receives: Option<u32>,
    pub retry: RetryBackoff,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    OutOfRange { key: &'static str, expected: &'static str },
    InvalidAckPolicy(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got '{value}'")
            }
            ConfigError::OutOfRange { key, expected } => write!(f, "{key} must be {expected}"),
            ConfigError::InvalidAckPolicy(value) => write!(
                f,
                "APP_WORKER_ACK_POLICY must be 'always' or 'on_success', got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::OutOfRange { .. }
            | ConfigError::InvalidAckPolicy(_) => None,
        }
    }
}
