//! Director error types.

use camcut_media::MediaError;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type DirectorResult<T> = Result<T, DirectorError>;

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("Failed to open source {path}: {source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("Content scorer failed on source {source_index}: {source}")]
    Scorer {
        source_index: usize,
        #[source]
        source: MediaError,
    },

    #[error("Mux failed: {0}")]
    Mux(#[source] MediaError),

    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DirectorError {
    pub fn source_open(path: impl AsRef<Path>, source: MediaError) -> Self {
        Self::SourceOpen {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn scorer(source_index: usize, source: MediaError) -> Self {
        Self::Scorer {
            source_index,
            source,
        }
    }

    /// Wrap a mux failure. A cancelled mux stays a cancellation.
    pub fn mux(source: MediaError) -> Self {
        match source {
            MediaError::Cancelled => Self::Cancelled,
            other => Self::Mux(other),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Media(MediaError::Cancelled))
    }

    /// Captured stderr of the external process behind this error, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::SourceOpen { source, .. } | Self::Scorer { source, .. } => source.diagnostics(),
            Self::Mux(source) | Self::Media(source) => source.diagnostics(),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceOpen { .. } => "source_open",
            Self::Scorer { .. } => "scorer",
            Self::Mux(_) => "mux",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Config(_) => "config",
            Self::Cancelled => "cancelled",
            Self::Media(_) => "media",
            Self::Io(_) => "io",
        }
    }
}
