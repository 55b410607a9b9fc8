use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Library path for {library} is missing")]
    MissingLibraryPath { library: &'static str },

    #[error("Library path for {library} must be absolute: {path:?}")]
    RelativeLibraryPath { library: &'static str, path: PathBuf },

    #[error("Movie and TV libraries share the same path: {path:?}")]
    SameLibraryPaths { path: PathBuf },

    #[error("Copy tool '{program}' is unavailable: {reason}")]
    CopyToolUnavailable { program: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
