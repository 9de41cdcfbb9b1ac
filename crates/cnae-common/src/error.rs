//! Error types shared by the CNAE crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CnaeError>;

/// Main error type for the shared library
#[derive(Error, Debug)]
pub enum CnaeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
