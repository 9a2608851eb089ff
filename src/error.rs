use std::path::PathBuf;

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum JukeboxError {
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Audio processing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("No song found that matches \"{0}\"")]
    SongNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Track resolution and loop-timing errors
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Multiple files found for {identity}: {candidates:?}")]
    Ambiguous {
        identity: String,
        candidates: Vec<PathBuf>,
    },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed loop timings in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Audio processing errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("ffmpeg not found - please install ffmpeg")]
    FfmpegNotFound,

    #[error("ffmpeg failed with status {0}")]
    FfmpegFailed(std::process::ExitStatus),

    #[error("ffmpeg error: {0}")]
    FfmpegError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

/// Playback errors
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Failed to open {path}: {reason}")]
    Load { path: PathBuf, reason: String },
}

/// Result type alias for kkjukebox operations
pub type Result<T> = std::result::Result<T, JukeboxError>;

impl JukeboxError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            JukeboxError::Config(_) => 2,
            JukeboxError::SongNotFound(_) => 3,
            _ => 1,
        }
    }
}
