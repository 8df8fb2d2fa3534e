use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = GripperError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GripperError {
    #[error("port not found: {0}")]
    PortNotFound(String),
    #[error("failed to open {path}: {reason}")]
    Connect { path: String, reason: String },
    #[error("not connected")]
    NotConnected,
    #[error("I/O error: {0}")]
    Io(String),
    #[error("short write: {written} of {expected} bytes accepted")]
    ShortWrite { written: usize, expected: usize },
    #[error("reader thread did not stop within {0:?}")]
    ReaderStuck(Duration),
    #[error("failed to spawn reader thread: {0}")]
    Spawn(String),
}

impl From<std::io::Error> for GripperError {
    fn from(e: std::io::Error) -> Self {
        GripperError::Io(e.to_string())
    }
}

/// Failure to turn one extracted record into a telemetry sample.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected record shape: {0}")]
    Shape(&'static str),
}
