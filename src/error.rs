use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BidsError {
    #[error("unknown sequence: {0}")]
    UnknownSequence(String),

    #[error("duplicate sequence key in registry: {0}")]
    DuplicateSequence(String),

    #[error("invalid BIDS suffix for sequence {sequence}: {suffix}")]
    InvalidSuffix { sequence: String, suffix: String },

    #[error("invalid subject pattern: {0}")]
    InvalidSubjectPattern(String),

    #[error("invalid subject id: {0}")]
    InvalidSubjectId(String),

    #[error("source root does not exist: {0}")]
    MissingSourceRoot(PathBuf),

    #[error("missing setting: {0} (set it in the config file or on the command line)")]
    MissingSetting(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid sidecar {path}: {message}")]
    InvalidSidecar { path: PathBuf, message: String },

    #[error("failed to read DICOM header from {path}: {message}")]
    DicomRead { path: PathBuf, message: String },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("converter failed for {sequence} (exit status {status}): {message}")]
    ConverterFailed {
        sequence: String,
        status: String,
        message: String,
    },
}
