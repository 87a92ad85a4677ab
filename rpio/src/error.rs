//! Error types for GPIO and SPI operations

use std::io;
use thiserror::Error;

/// Errors reported by the control layer
///
/// Every error is reported synchronously to the caller of the operation that
/// produced it. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrong argument count or type at the host boundary. Raised before
    /// any register is touched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The process lacks the privilege needed to map peripheral memory
    #[error("you must be root to access GPIO")]
    PermissionDenied,

    /// Mapping the peripheral registers failed
    #[error("could not initialize GPIO: {reason}")]
    InitializationFailed {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    /// A pin or SPI operation was issued before `start()` succeeded
    #[error("GPIO has not been started")]
    NotInitialized,

    /// The low-level SPI exchange reported a fault
    #[error("SPI transfer failed: {0}")]
    TransferFailed(String),

    /// Header position without a GPIO line (power, ground, ID EEPROM)
    #[error("invalid pin: {0}")]
    InvalidPin(u8),

    /// Configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn init(reason: impl Into<String>) -> Self {
        Error::InitializationFailed {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn init_io(reason: impl Into<String>, source: io::Error) -> Self {
        Error::InitializationFailed {
            reason: reason.into(),
            source: Some(source),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

/// Result type returned by every fallible operation in this crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_start_failures() {
        assert_eq!(
            Error::PermissionDenied.to_string(),
            "you must be root to access GPIO"
        );
        assert_eq!(
            Error::init("mmap failed").to_string(),
            "could not initialize GPIO: mmap failed"
        );
    }

    #[test]
    fn test_init_io_keeps_source() {
        use std::error::Error as _;

        let err = Error::init_io(
            "open /dev/mem",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.source().is_some());
    }
}
