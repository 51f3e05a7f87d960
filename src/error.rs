use crate::document::SearchError;
use std::path::PathBuf;
use thiserror::Error;

/// Pagesmith error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to write config file: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Config validation error: {0}")]
    ConfigValidation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No {kind} '{key}' exists")]
    UnknownKey { kind: &'static str, key: String },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Reference '{reference}' points at a missing {kind}: {path}")]
    MissingSource {
        reference: String,
        kind: &'static str,
        path: PathBuf,
    },

    #[error(
        "Mapping '{mapping}' would create a cycle: '{contributor}' already depends on '{consumer}'"
    )]
    Cycle {
        mapping: String,
        consumer: String,
        contributor: String,
    },

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Mapping '{mapping}' failed while building '{reference}' ({side} side): {source}")]
    MappingSearch {
        mapping: String,
        reference: String,
        side: &'static str,
        #[source]
        source: SearchError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Pagesmith operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure categories used when reporting errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Cycle,
    Path,
    Search,
    StateConflict,
    Config,
    Io,
    Other,
}

impl Error {
    /// Create a config validation error
    pub fn config_validation(msg: impl Into<String>) -> Self {
        Error::ConfigValidation(msg.into())
    }

    /// Create a validation error for malformed input or persisted data
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a state conflict error
    pub fn state_conflict(msg: impl Into<String>) -> Self {
        Error::StateConflict(msg.into())
    }

    /// Create an unknown reference error
    pub fn unknown_reference(key: impl Into<String>) -> Self {
        Error::UnknownKey {
            kind: "reference",
            key: key.into(),
        }
    }

    /// Create an unknown mapping error
    pub fn unknown_mapping(key: impl Into<String>) -> Self {
        Error::UnknownKey {
            kind: "mapping",
            key: key.into(),
        }
    }

    /// Create a parser error
    pub fn parser(msg: impl Into<String>) -> Self {
        Error::Parser(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::UnknownKey { .. } => ErrorKind::Validation,
            Error::Cycle { .. } => ErrorKind::Cycle,
            Error::PathNotFound(_) | Error::MissingSource { .. } => ErrorKind::Path,
            Error::MappingSearch { .. } => ErrorKind::Search,
            Error::StateConflict(_) => ErrorKind::StateConflict,
            Error::ConfigParse(_) | Error::ConfigWrite(_) | Error::ConfigValidation(_) => {
                ErrorKind::Config
            }
            Error::Io(_) | Error::WalkDir(_) => ErrorKind::Io,
            Error::Json(_) | Error::Parser(_) | Error::Other(_) => ErrorKind::Other,
        }
    }
}
