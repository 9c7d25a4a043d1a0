use thiserror::Error;

/// Errors shared across the latchkey workspace.
///
/// The variants map one-to-one onto the outcomes presentation adapters need
/// to distinguish: retry-now conditions (`Unreachable`, `ReadyTimeout`) versus
/// permanent failures (`InvalidFormat`, `Config`) versus plain lookup misses
/// (`NotFound`).
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown device or slot. Operations on unknown identifiers fail loudly,
    /// never silently no-op.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input, typically a PIN that is not 4-8 ASCII digits.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Transport failure: device asleep, out of range, or the serial link is
    /// gone. Retrying later is reasonable.
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    /// The driver connection did not become ready within the readiness
    /// timeout. A reconnect attempt remains scheduled.
    #[error("Connection not ready within {timeout_secs}s")]
    ReadyTimeout { timeout_secs: u64 },

    /// The session was released; no further operations are possible.
    #[error("Session is shut down")]
    ShutDown,

    /// Fatal configuration problem (e.g. missing serial target). Never
    /// retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Code store failure (persistence or decryption).
    #[error("Code store error: {0}")]
    Store(String),

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an invalid-format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat(message.into())
    }

    /// Create an unreachable error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a code store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Returns `true` for conditions where an immediate retry is sensible
    /// (transport hiccups), as opposed to permanent rejections.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::ReadyTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("node 99");
        assert_eq!(err.to_string(), "Not found: node 99");

        let err = Error::ReadyTimeout { timeout_secs: 60 };
        assert_eq!(err.to_string(), "Connection not ready within 60s");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::unreachable("asleep").is_retryable());
        assert!(Error::ReadyTimeout { timeout_secs: 5 }.is_retryable());
        assert!(!Error::invalid_format("pin").is_retryable());
        assert!(!Error::config("no port").is_retryable());
        assert!(!Error::ShutDown.is_retryable());
    }
}
