use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Transport is not connected")]
    NotConnected,
    #[error("Transport is already connected")]
    AlreadyConnected,
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
