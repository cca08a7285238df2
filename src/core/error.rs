//! Error types for SegmentLiftover
//!
//! Each layer has its own error enum. Row-level anomalies never become
//! errors (they are filters), file-level errors abort one file, and only
//! `ConfigError` aborts a run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for SegmentLiftover operations
#[derive(Debug, Error)]
pub enum LiftoverError {
    /// Invalid run configuration (fatal)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External translation engine errors
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Per-file conversion errors
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Remap cache log errors
    #[error("Remap log error: {0}")]
    RemapLog(#[from] RemapLogError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration problems detected before any file is processed
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The liftOver executable does not exist
    #[error("Can not find the liftOver program at {0}")]
    EngineNotFound(PathBuf),

    /// The chain (mapping definition) file does not exist
    #[error("Chain file does not exist: {0}")]
    ChainNotFound(PathBuf),

    /// Step size must be positive
    #[error("Step size must be greater than 0, got {0}")]
    InvalidStepSize(i64),

    /// Search range must be positive
    #[error("Search range must be greater than 0, got {0}")]
    InvalidRange(i64),

    /// Range and step size ask for too many neighbours per position
    #[error("Search range needs {steps} steps, at most {max} are allowed")]
    TooManySteps { steps: u64, max: u64 },

    /// Thread count must be positive
    #[error("Thread count must be greater than 0")]
    InvalidThreads,

    /// A file name pattern is not a valid regular expression
    #[error("{pattern} is not a valid regular expression: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Neither a segment nor a probe pattern was given
    #[error("Must specify at least one input file pattern for segment or probe files")]
    NoInputKind,

    /// A resume index or progress file does not exist
    #[error("Resume {role} file does not exist: {path}")]
    ResumeFileNotFound { role: &'static str, path: PathBuf },

    /// Input directory does not exist
    #[error("Input directory does not exist: {0}")]
    InputDirNotFound(PathBuf),
}

/// Errors raised by the external coordinate translation engine
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The engine process could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// The engine exited unsuccessfully
    #[error("{program} exited with {status}")]
    Failed { program: PathBuf, status: String },

    /// The engine did not finish in time
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: PathBuf, timeout: Duration },

    /// The engine reported success but produced no mapped-results file
    #[error("Engine output missing: {0}")]
    MissingOutput(PathBuf),

    /// Scratch file I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reading or writing a delimited table
#[derive(Debug, Error)]
pub enum TableError {
    /// No header line
    #[error("Table is empty (no header line)")]
    Empty,

    /// Header has fewer columns than the record kind needs
    #[error("Too few columns: expected at least {expected}, found {found}")]
    TooFewColumns { expected: usize, found: usize },

    /// Line is not valid UTF-8
    #[error("Invalid UTF-8 at line {0}")]
    InvalidUtf8(usize),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File-level conversion failures
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Input table could not be read
    #[error("Invalid input table {path}: {source}")]
    Table { path: PathBuf, source: TableError },

    /// The translation engine failed for this file
    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    /// Output could not be written
    #[error("Failed to write output {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors loading a remap cache log
#[derive(Debug, Error)]
pub enum RemapLogError {
    /// Header does not have the four expected columns
    #[error("Wrong remap file: header has {found} columns, expected 4")]
    InvalidHeader { found: usize },

    /// Empty file
    #[error("Wrong remap file: missing header")]
    MissingHeader,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for SegmentLiftover operations
pub type Result<T> = std::result::Result<T, LiftoverError>;

/// Result type alias for configuration validation
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for engine calls
pub type TranslationResult<T> = std::result::Result<T, TranslationError>;

/// Result type alias for table operations
pub type TableResult<T> = std::result::Result<T, TableError>;

/// Result type alias for conversion operations
pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::InvalidStepSize(0);
        assert_eq!(err.to_string(), "Step size must be greater than 0, got 0");

        let err = ConfigError::ResumeFileNotFound {
            role: "progress",
            path: PathBuf::from("logs/progress.log"),
        };
        assert!(err.to_string().contains("progress"));
    }

    #[test]
    fn test_error_conversion_chain() {
        let inner = TranslationError::MissingOutput(PathBuf::from("/tmp/out.bed"));
        let conv: ConversionError = inner.into();
        let top: LiftoverError = conv.into();
        assert!(matches!(
            top,
            LiftoverError::Conversion(ConversionError::Translation(_))
        ));
    }
}
