use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = ContextError> = std::result::Result<T, E>;

/// Errors that abort a single generation run or configuration action.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ContextError {
    #[error("Failed to parse configuration '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to read configuration '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write configuration '{path}': {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Source directory '{0}' does not exist")]
    SourceMissing(PathBuf),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Non-fatal problems recorded while generating a document.
///
/// None of these stop a run; they are logged and attached to the
/// resulting [`ContextDocument`](crate::app::models::ContextDocument).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("Input file '{0}' not found")]
    MissingInputFile(String),

    #[error("Path '{0}' lies outside the source directory")]
    OutsideSource(String),

    #[error("File system access failed: {0}")]
    FileSystemAccess(String),

    #[error("Skipped symlink '{0}'")]
    SkippedSymlink(String),

    #[error("Binary file '{0}' not displayed")]
    BinaryFile(String),
}
