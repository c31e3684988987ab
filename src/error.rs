use thiserror::Error;

pub type Result<T> = std::result::Result<T, StationError>;

/// Failures caught at the boundary of a single track's playback attempt.
#[derive(Error, Debug)]
pub enum StationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),
}
