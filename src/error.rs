use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid frame dimensions {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },

    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("Detections dump line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
}
