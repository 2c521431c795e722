use std::fmt;

use spirida_core::CoreError;

#[derive(Debug)]
pub enum RhythmError {
    InvalidParameter(String),
    /// No field registered under this name. Callers treat this as a miss,
    /// not a failure of the orchestrator.
    FieldNotFound(String),
    /// Maintenance was started outside a tokio runtime.
    NoRuntime,
    Config(toml::de::Error),
    ConfigWrite(toml::ser::Error),
    Io(std::io::Error),
}

impl fmt::Display for RhythmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RhythmError::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            RhythmError::FieldNotFound(name) => write!(f, "field not found: {name}"),
            RhythmError::NoRuntime => write!(f, "maintenance requires a running tokio runtime"),
            RhythmError::Config(e) => write!(f, "config error: {e}"),
            RhythmError::ConfigWrite(e) => write!(f, "config serialization error: {e}"),
            RhythmError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for RhythmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RhythmError::Config(e) => Some(e),
            RhythmError::ConfigWrite(e) => Some(e),
            RhythmError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoreError> for RhythmError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidParameter(msg) => RhythmError::InvalidParameter(msg),
        }
    }
}

impl From<toml::de::Error> for RhythmError {
    fn from(e: toml::de::Error) -> Self {
        RhythmError::Config(e)
    }
}

impl From<toml::ser::Error> for RhythmError {
    fn from(e: toml::ser::Error) -> Self {
        RhythmError::ConfigWrite(e)
    }
}

impl From<std::io::Error> for RhythmError {
    fn from(e: std::io::Error) -> Self {
        RhythmError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, RhythmError>;
