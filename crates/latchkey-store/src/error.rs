//! Error types for code store operations.

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the code store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key file content is not a valid key.
    #[error("Invalid store key: {reason}")]
    InvalidKey { reason: String },

    /// Encryption or decryption failed. Authenticated decryption fails on
    /// any tampering; no distinction is made between a wrong key and a
    /// modified blob.
    #[error("Crypto failure: {message}")]
    Crypto { message: String },

    /// The store file content is not usable (bad JSON, duplicate slots).
    #[error("Corrupt code store: {reason}")]
    Corrupt { reason: String },

    /// PIN or slot validation failure.
    #[error("{0}")]
    Code(#[from] latchkey_core::Error),

    /// Serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create an invalid-key error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Create a crypto error.
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a corrupt-store error.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }
}
