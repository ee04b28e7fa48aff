use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

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
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
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
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let uri = non_empty_var("MONGODB_URI");
        if uri.is_none() && environment == AppEnvironment::Production {
            return Err(ConfigError::MissingDatabaseUri);
        }
        let database_name =
            non_empty_var("MONGODB_DATABASE").unwrap_or_else(|| "registration".to_string());

        let storage = StorageConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            database: DatabaseConfig {
                uri,
                name: database_name,
            },
            storage,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
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

/// Output style for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Document database connection settings.
///
/// A missing `uri` outside production means users are kept in memory.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: Option<String>,
    pub name: String,
}

/// Where uploaded documents land and how large a request may be.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub public_root: PathBuf,
    pub uploads_folder: String,
    pub max_upload_bytes: usize,
    pub keep_local_copy: bool,
    pub drive: Option<DriveConfig>,
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let public_root = PathBuf::from(
            non_empty_var("UPLOAD_PUBLIC_ROOT").unwrap_or_else(|| "public".to_string()),
        );
        let uploads_folder = non_empty_var("UPLOAD_FOLDER")
            .map(|folder| folder.trim_matches('/').to_string())
            .unwrap_or_else(|| "uploads".to_string());
        if uploads_folder.is_empty() || uploads_folder.split('/').any(|part| part == "..") {
            return Err(ConfigError::InvalidUploadFolder(uploads_folder));
        }

        let max_upload_bytes = match non_empty_var("UPLOAD_MAX_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or(ConfigError::InvalidUploadLimit)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let keep_local_copy = match non_empty_var("UPLOAD_KEEP_LOCAL") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                key: "UPLOAD_KEEP_LOCAL",
            })?,
            None => false,
        };

        let drive = match (
            non_empty_var("GOOGLE_DRIVE_SERVICE_ACCOUNT_KEY"),
            non_empty_var("GOOGLE_DRIVE_FOLDER_ID"),
        ) {
            (Some(key), Some(folder_id)) => Some(DriveConfig {
                service_account_key: PathBuf::from(key),
                folder_id,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteDriveConfig),
        };

        Ok(Self {
            public_root,
            uploads_folder,
            max_upload_bytes,
            keep_local_copy,
            drive,
        })
    }
}

/// Credentials and destination for the Google Drive object store.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub service_account_key: PathBuf,
    pub folder_id: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingDatabaseUri,
    InvalidUploadFolder(String),
    InvalidUploadLimit,
    InvalidFlag { key: &'static str },
    IncompleteDriveConfig,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingDatabaseUri => {
                write!(f, "MONGODB_URI is required in production")
            }
            ConfigError::InvalidUploadFolder(folder) => {
                write!(f, "UPLOAD_FOLDER '{folder}' must be a relative folder name")
            }
            ConfigError::InvalidUploadLimit => {
                write!(f, "UPLOAD_MAX_BYTES must be a positive integer")
            }
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
            ConfigError::IncompleteDriveConfig => write!(
                f,
                "GOOGLE_DRIVE_SERVICE_ACCOUNT_KEY and GOOGLE_DRIVE_FOLDER_ID must be set together"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
