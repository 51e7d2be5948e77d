//! Error types for note-map generation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapError>;

/// Everything that can abort a generation run or a store operation.
///
/// Acoustic edge cases (silence, no peaks, a degenerate tempo lag range) are
/// not errors; they are absorbed by the analysis stages with default behavior.
#[derive(Debug, Error)]
pub enum MapError {
    /// The source only supports streamed playback and has no decoded samples.
    #[error("audio source '{0}' is streaming-only; decode it fully before analysis")]
    UnsupportedInput(String),

    /// Sample extraction failed part way through.
    #[error("failed to read samples from '{clip}': {reason}")]
    ReadFailure { clip: String, reason: String },

    #[error("could not access beat map at {path}")]
    PersistenceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed beat map at {path}")]
    PersistenceFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A persisted map parsed but breaks the lane, power or ordering bounds.
    #[error("beat map for '{clip}' is inconsistent: {reason}")]
    InconsistentMap { clip: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("analysis window size {0} is not a power of two")]
    InvalidWindowSize(usize),

    /// The in-flight run was cancelled before it completed.
    #[error("generation was cancelled before completing")]
    Interrupted,
}

impl MapError {
    pub fn read_failure(clip: impl Into<String>, reason: impl ToString) -> Self {
        MapError::ReadFailure {
            clip: clip.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors raised while loading or saving a persisted map.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            MapError::PersistenceIo { .. } | MapError::PersistenceFormat { .. }
        )
    }
}
