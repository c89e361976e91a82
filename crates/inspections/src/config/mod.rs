use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use crate::workflows::inspection::ResolutionPolicy;

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
    pub storage: StorageConfig,
    pub archival: ArchivalConfig,
    pub roster: ResolutionPolicy,
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

        let database_path = env::var("APP_DATABASE_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let upload_dir = PathBuf::from(
            env::var("APP_UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
        );

        let interval_secs =
            bounded_var("APP_ARCHIVE_INTERVAL_SECS", 86_400, MAX_ARCHIVE_INTERVAL_SECS)?;
        let retention_days =
            bounded_var("APP_ARCHIVE_RETENTION_DAYS", 7, MAX_ARCHIVE_RETENTION_DAYS)?;

        let roster = match env::var("APP_INSPECTOR_RESOLUTION") {
            Ok(value) => ResolutionPolicy::parse(&value).ok_or(ConfigError::InvalidValue {
                variable: "APP_INSPECTOR_RESOLUTION",
                value,
            })?,
            Err(_) => ResolutionPolicy::Lenient,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets: environment != AppEnvironment::Production,
            },
            storage: StorageConfig {
                database_path,
                upload_dir,
            },
            archival: ArchivalConfig {
                interval_secs,
                retention_days,
            },
            roster,
        })
    }
}

/// Upper bound for `APP_ARCHIVE_RETENTION_DAYS` (one century).
pub const MAX_ARCHIVE_RETENTION_DAYS: u64 = 36_500;
/// Upper bound for `APP_ARCHIVE_INTERVAL_SECS` (one year).
pub const MAX_ARCHIVE_INTERVAL_SECS: u64 = 31_536_000;

fn bounded_var(variable: &'static str, default: u64, max: u64) -> Result<u64, ConfigError> {
    let Ok(value) = env::var(variable) else {
        return Ok(default);
    };

    match value.trim().parse::<u64>() {
        Ok(parsed) if (1..=max).contains(&parsed) => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { variable, value }),
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
    pub include_targets: bool,
}

/// Where case records and uploaded photos live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// `None` keeps records in process memory.
    pub database_path: Option<PathBuf>,
    pub upload_dir: PathBuf,
}

/// Archival sweep cadence and retention window.
#[derive(Debug, Clone, Copy)]
pub struct ArchivalConfig {
    pub interval_secs: u64,
    pub retention_days: u64,
}

impl ArchivalConfig {
    pub fn interval(&self) -> StdDuration {
        StdDuration::from_secs(self.interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days as i64)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { variable: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { variable, value } => {
                write!(f, "{variable} has an unsupported value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
