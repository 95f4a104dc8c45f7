//! Driver error types

use thiserror::Error;
use uac_proto::ParseError;

/// Errors returned by the class driver
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument is out of range or inconsistent
    #[error("Invalid argument: {0}")]
    InvalidArg(&'static str),

    /// The operation is not legal in the current driver or stream state
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// No device or stream matches the given handle or address
    #[error("Not found: {0}")]
    NotFound(&'static str),

    /// The device does not support the requested capability
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    /// A buffer or transfer allocation failed
    #[error("Out of memory: {0}")]
    NoMem(&'static str),

    /// A bounded wait expired before the operation completed
    #[error("Timed out: {0}")]
    Timeout(&'static str),

    /// A transfer completed with an error status
    #[error("Transfer failed: {0}")]
    TransferError(&'static str),

    /// The device's descriptors could not be parsed
    #[error("Descriptor parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error reported by the underlying USB host stack
    #[error("Host stack error: {0}")]
    Host(String),
}

/// Type alias for driver results
pub type Result<T> = std::result::Result<T, Error>;
