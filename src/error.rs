//! Error taxonomy shared by the loader, mappers, and bus.

use thiserror::Error;

/// Failures the core can report to its caller. Loader errors (I/O, format)
/// propagate unmodified; mapper errors raised during program execution are
/// recoverable and may be logged and dropped by the driver.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("illegal format: {0}")]
    IllegalFormat(String),
    #[error("size overflow: {what} needs {requested} bytes, capacity is {capacity}")]
    SizeOverflow {
        what: &'static str,
        requested: usize,
        capacity: usize,
    },
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    #[error("illegal operation: {0}")]
    IllegalOperation(String),
    #[error("unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, EmuError>;
