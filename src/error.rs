use thiserror::Error;

#[derive(Debug, Error)]
pub enum DissectError {
    #[error("config error: {0}")]
    Config(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DissectError>;
