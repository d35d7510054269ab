use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MrDataError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("encoding header could not be (de)serialized: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path} is not a {expected} file")]
    BadMagic { path: String, expected: &'static str },
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("index {index} out of range for {len} items")]
    OutOfRange { index: usize, len: usize },
    #[error("unknown image info key `{0}`")]
    UnknownInfoKey(String),
    #[error("group `{0}` not found")]
    GroupNotFound(String),
    #[error("no coil sensitivity map for slice {0}")]
    NoCoilMap(u16),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("only cartesian trajectories are supported")]
    UnsupportedTrajectory,
}

pub type Result<T> = std::result::Result<T, MrDataError>;
