use crate::client::ClientError;
use crate::config::ConfigError;
use crate::drive::ObjectStoreError;
use crate::telemetry::TelemetryError;
use std::fmt;

/// Failures that stop the binary: bootstrap, serving, or a CLI submission.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    ObjectStore(ObjectStoreError),
    Client(ClientError),
    InvalidInput(String),
    Rejected(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::ObjectStore(err) => write!(f, "object store error: {}", err),
            AppError::Client(err) => write!(f, "submission error: {}", err),
            AppError::InvalidInput(detail) => write!(f, "invalid input: {}", detail),
            AppError::Rejected(message) => write!(f, "registration rejected: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::ObjectStore(err) => Some(err),
            AppError::Client(err) => Some(err),
            AppError::InvalidInput(_) | AppError::Rejected(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ObjectStoreError> for AppError {
    fn from(value: ObjectStoreError) -> Self {
        Self::ObjectStore(value)
    }
}

impl From<ClientError> for AppError {
    fn from(value: ClientError) -> Self {
        Self::Client(value)
    }
}
