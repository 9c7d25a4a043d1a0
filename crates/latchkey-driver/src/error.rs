//! Error types for driver operations.
//!
//! The classification here matters to callers: transport-level failures
//! (serial link gone, device asleep) trigger reconnection or "try again
//! later" reporting, while logical failures (unknown node, unsupported
//! command class) are surfaced as-is and never retried.

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors that can occur during driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// No connection to the driver is established.
    #[error("Driver not connected")]
    NotConnected,

    /// Establishing the driver connection failed.
    #[error("Connection failed: {message}")]
    ConnectFailed { message: String },

    /// The target node is not part of the network.
    #[error("Node {node_id} not found on network")]
    NodeNotFound { node_id: u8 },

    /// The device did not respond within the transport's timeout.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Transport-level communication failure.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// The device does not support the requested command class.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Create a connect-failed error.
    pub fn connect_failed(message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            message: message.into(),
        }
    }

    /// Create a node-not-found error.
    pub fn node_not_found(node_id: u8) -> Self {
        Self::NodeNotFound { node_id }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Returns `true` when the failure is transport-level: the device may be
    /// asleep or the link may be down, and retrying later can succeed.
    ///
    /// Logical failures (unknown node, unsupported command class) return
    /// `false` and must not be retried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectFailed { .. }
                | Self::Timeout { .. }
                | Self::CommunicationError { .. }
                | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DriverError::node_not_found(99);
        assert_eq!(error.to_string(), "Node 99 not found on network");

        let error = DriverError::timeout(3000);
        assert_eq!(error.to_string(), "Operation timeout after 3000ms");
    }

    #[test]
    fn test_transport_classification() {
        assert!(DriverError::NotConnected.is_transport());
        assert!(DriverError::timeout(1000).is_transport());
        assert!(DriverError::communication("serial gone").is_transport());
        assert!(DriverError::connect_failed("port busy").is_transport());

        assert!(!DriverError::node_not_found(7).is_transport());
        assert!(!DriverError::unsupported("user code").is_transport());
    }
}
