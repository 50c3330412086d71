//! Error types for the control path.
//!
//! Nothing on the audio path returns an error: out-of-range values are
//! clamped inline and unknown selectors fall back to a default variant.
//! These types cover configuration loading and routing-graph misuse by the
//! caller (unknown names, exhausted source storage).

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, saving or validating an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field is outside its allowed range
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a validation error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::Invalid(reason.into())
    }
}

/// Errors raised by the modulation registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    /// No source is registered under this name
    #[error("unknown mapping source: {0}")]
    UnknownSource(String),

    /// No target is registered under this name
    #[error("unknown mapping target: {0}")]
    UnknownTarget(String),

    /// The shared source bank cannot hold another source
    #[error("source bank full: requested {requested} cells, {available} available")]
    SourceBankFull {
        /// Cells the new source needs.
        requested: usize,
        /// Cells still free.
        available: usize,
    },

    /// A source or target with this name already exists
    #[error("duplicate name: {0}")]
    DuplicateName(String),
}

/// Errors raised while building or wiring the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A component asked for a parameter the store does not declare
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Routing error
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    #[test]
    fn test_read_file_factory_and_display() {
        let err = ConfigError::read_file("/a/b.toml", mock_io_err());
        assert!(
            matches!(err, ConfigError::ReadFile { ref path, .. } if path == std::path::Path::new("/a/b.toml"))
        );
        let msg = err.to_string();
        assert!(msg.contains("failed to read file"), "got: {msg}");
        assert!(err.source().is_some(), "ReadFile must expose I/O source");
    }

    #[test]
    fn test_write_file_factory_and_display() {
        let err = ConfigError::write_file("/out/engine.toml", mock_io_err());
        let msg = err.to_string();
        assert!(msg.contains("failed to write file"), "got: {msg}");
        assert!(msg.contains("/out/engine.toml"), "got: {msg}");
    }

    #[test]
    fn test_invalid_display() {
        let err = ConfigError::invalid("voices must be 1..=12");
        assert_eq!(err.to_string(), "invalid config: voices must be 1..=12");
    }

    #[test]
    fn test_mapping_error_display() {
        let err = MappingError::SourceBankFull { requested: 48, available: 10 };
        assert_eq!(
            err.to_string(),
            "source bank full: requested 48 cells, 10 available"
        );
        assert_eq!(
            MappingError::UnknownSource("LFO9".into()).to_string(),
            "unknown mapping source: LFO9"
        );
    }

    #[test]
    fn test_engine_error_wraps_transparently() {
        let err: EngineError = MappingError::UnknownTarget("Filter1 Cutoff T4".into()).into();
        assert_eq!(err.to_string(), "unknown mapping target: Filter1 Cutoff T4");
        let err: EngineError = ConfigError::invalid("bad").into();
        assert!(matches!(err, EngineError::Config(ConfigError::Invalid(_))));
    }
}
