//! Driver trait definition and the types it reports.
//!
//! [`LockDriver`] is the contract between the latchkey core and the external
//! Z-Wave driver. It deliberately mirrors the driver's per-device command
//! surface (door-lock get/set, user-code get/set/clear, battery, node
//! metadata) without adding policy: settle delays, verification reads, and
//! reconnection all live above this boundary.
//!
//! All methods use native `async fn` (Edition 2024 RPITIT), so the trait is
//! not object-safe; use the [`AnyLockDriver`](crate::drivers::AnyLockDriver)
//! enum wrapper for dispatch.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use chrono::{DateTime, Utc};
use latchkey_core::{CodeSlot, DoorMode, NodeId, PinCode, SlotStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Progress of a device's post-inclusion interview.
///
/// Full capabilities of a node are only known once the interview completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    /// Interview has not started.
    Pending,

    /// Interview is running.
    InProgress,

    /// Interview finished; capabilities are fully known.
    Complete,

    /// A bounded wait for completion expired. The device may still finish
    /// later; this is "timed out, not failed".
    Incomplete,
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in progress"),
            Self::Complete => write!(f, "complete"),
            Self::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// Link-layer security class a node was granted at inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityClass {
    /// No secure inclusion.
    None,

    /// Legacy S0 scheme, used by older lock hardware.
    S0Legacy,

    /// S2 unauthenticated class.
    S2Unauthenticated,

    /// S2 authenticated class.
    S2Authenticated,

    /// S2 access-control class (locks, garage doors).
    S2AccessControl,
}

impl fmt::Display for SecurityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::S0Legacy => write!(f, "S0 (legacy)"),
            Self::S2Unauthenticated => write!(f, "S2 unauthenticated"),
            Self::S2Authenticated => write!(f, "S2 authenticated"),
            Self::S2AccessControl => write!(f, "S2 access control"),
        }
    }
}

/// Read-only snapshot of a node's metadata.
///
/// Missing data is reported as `None` rather than failing the whole query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    /// Node this summary describes.
    pub node_id: NodeId,

    /// Whether the node currently answers commands.
    pub ready: bool,

    /// Interview progress.
    pub interview: InterviewStatus,

    /// Granted security class, if known.
    pub security: Option<SecurityClass>,

    /// Manufacturer name, if the interview got that far.
    pub manufacturer: Option<String>,

    /// Product label, if known.
    pub product: Option<String>,
}

/// Notification kinds a lock reports outside request/response exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum NotificationKind {
    /// Bolt thrown by hand or key.
    ManualLock,

    /// Bolt retracted by hand or key.
    ManualUnlock,

    /// Bolt thrown from the keypad.
    KeypadLock,

    /// Bolt retracted from the keypad with a valid code.
    KeypadUnlock,

    /// Bolt thrown by radio command.
    RfLock,

    /// Bolt retracted by radio command.
    RfUnlock,

    /// Bolt could not extend fully.
    JammedBolt,
}

/// Event reported by the driver connection.
///
/// Events for a given node are delivered in the order the transport reports
/// them; this crate performs no reordering or coalescing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DriverEvent {
    /// A reported value on a node changed.
    ValueChanged {
        node_id: NodeId,
        property: String,
        value: String,
        at: DateTime<Utc>,
    },

    /// A notification frame from a node.
    Notification {
        node_id: NodeId,
        kind: NotificationKind,
        at: DateTime<Utc>,
    },

    /// A node joined the network.
    NodeAdded(NodeId),

    /// A node left the network.
    NodeRemoved(NodeId),

    /// Fatal transport failure (e.g. the serial adapter was unplugged).
    /// The session reacts by scheduling a reconnect.
    TransportFailed { reason: String },
}

impl DriverEvent {
    /// Node the event concerns, when it is node-scoped.
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::ValueChanged { node_id, .. } | Self::Notification { node_id, .. } => {
                Some(*node_id)
            }
            Self::NodeAdded(node_id) | Self::NodeRemoved(node_id) => Some(*node_id),
            Self::TransportFailed { .. } => None,
        }
    }

    /// Returns `true` for the fatal transport-failure event.
    #[must_use]
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::TransportFailed { .. })
    }
}

/// Boundary to the external Z-Wave protocol driver.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future` (Edition 2024 RPITIT). Use generic type parameters, or the
/// [`AnyLockDriver`](crate::drivers::AnyLockDriver) enum wrapper for
/// concrete dispatch.
///
/// # Errors
///
/// All operations return [`Result`] with [`DriverError`](crate::DriverError).
/// Callers use [`DriverError::is_transport`](crate::DriverError::is_transport)
/// to decide between "retry later" and "permanent".
pub trait LockDriver: Send + Sync {
    /// Establish the connection to the driver's transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened. Callers own the
    /// retry policy; this method makes exactly one attempt.
    async fn connect(&mut self) -> Result<()>;

    /// Tear down the connection. Idempotent.
    async fn disconnect(&mut self) -> Result<()>;

    /// Whether the connection is established and serving commands.
    fn is_ready(&self) -> bool;

    /// Take the event stream for the current connection.
    ///
    /// Returns `Some` exactly once per established connection; subsequent
    /// calls return `None` until the next successful `connect()`.
    fn take_events(&mut self) -> Option<mpsc::Receiver<DriverEvent>>;

    /// Whether the node is part of the connection's network.
    async fn node_exists(&self, node_id: NodeId) -> Result<bool>;

    /// Send the secured/unsecured door-lock command.
    async fn door_lock_set(&mut self, node_id: NodeId, mode: DoorMode) -> Result<()>;

    /// Read the current door-lock mode.
    async fn door_lock_get(&mut self, node_id: NodeId) -> Result<DoorMode>;

    /// Write a user code with explicit occupied status.
    ///
    /// The command is acknowledged at the transport level only; whether the
    /// lock actually accepted the code must be verified by re-reading the
    /// slot status after a settle delay.
    async fn user_code_set(
        &mut self,
        node_id: NodeId,
        slot: CodeSlot,
        pin: &PinCode,
    ) -> Result<()>;

    /// Clear a user-code slot.
    async fn user_code_clear(&mut self, node_id: NodeId, slot: CodeSlot) -> Result<()>;

    /// Read the status of a user-code slot.
    ///
    /// Codes cannot be read back in plaintext; status is all the device
    /// reports.
    async fn user_code_status(&mut self, node_id: NodeId, slot: CodeSlot) -> Result<SlotStatus>;

    /// Device-reported number of user-code slots, `None` when unreported.
    async fn user_code_slot_count(&mut self, node_id: NodeId) -> Result<Option<u8>>;

    /// Battery level percentage, `None` when the node does not report one.
    async fn battery_level(&mut self, node_id: NodeId) -> Result<Option<u8>>;

    /// Read-only metadata snapshot for a node.
    async fn node_summary(&self, node_id: NodeId) -> Result<NodeSummary>;

    /// Wait up to `timeout` for the node's interview to complete.
    ///
    /// Resolves to [`InterviewStatus::Incomplete`] on expiry rather than
    /// erroring; the device may still complete afterwards.
    async fn wait_for_interview(
        &self,
        node_id: NodeId,
        timeout: Duration,
    ) -> Result<InterviewStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_node_scoping() {
        let node = NodeId::new(8).unwrap();

        let event = DriverEvent::Notification {
            node_id: node,
            kind: NotificationKind::KeypadUnlock,
            at: Utc::now(),
        };
        assert_eq!(event.node_id(), Some(node));
        assert!(!event.is_transport_failure());

        let event = DriverEvent::TransportFailed {
            reason: "serial unplugged".to_string(),
        };
        assert_eq!(event.node_id(), None);
        assert!(event.is_transport_failure());
    }

    #[test]
    fn test_interview_status_display() {
        assert_eq!(InterviewStatus::Complete.to_string(), "complete");
        assert_eq!(InterviewStatus::Incomplete.to_string(), "incomplete");
    }

    #[test]
    fn test_security_class_display() {
        assert_eq!(SecurityClass::S0Legacy.to_string(), "S0 (legacy)");
        assert_eq!(
            SecurityClass::S2AccessControl.to_string(),
            "S2 access control"
        );
    }
}
