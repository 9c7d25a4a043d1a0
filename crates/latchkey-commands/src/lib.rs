//! Operation surface of the latchkey lock controller.
//!
//! [`LockCommands`] ties the session, the code store, and the workflow
//! options together into the operations presentation adapters call: door
//! lock/unlock, the verified set-code workflow, code listing and deletion,
//! and node inspection. Everything here is explicit state passed in by the
//! caller; there are no process-wide singletons.
//!
//! # Example
//!
//! ```
//! use latchkey_commands::{LockCommands, WorkflowOptions};
//! use latchkey_driver::AnyLockDriver;
//! use latchkey_driver::mock::MockDriver;
//! use latchkey_session::{SessionManager, SessionOptions};
//! use latchkey_store::{CodeStore, StoreKey};
//!
//! #[tokio::main]
//! async fn main() -> latchkey_core::Result<()> {
//!     let (driver, handle) = MockDriver::new();
//!     let node = latchkey_core::NodeId::new(8).unwrap();
//!     handle.add_node(node);
//!
//!     let dir = tempfile::tempdir().unwrap();
//!     let store = CodeStore::open(dir.path().join("codes.json"), StoreKey::generate())
//!         .map_err(|e| latchkey_core::Error::store(e.to_string()))?;
//!     let session = SessionManager::new(AnyLockDriver::Mock(driver), SessionOptions::default());
//!
//!     let commands = LockCommands::new(session, store, WorkflowOptions::default());
//!     let report = commands.lock(node).await?;
//!     assert!(report.acknowledged);
//!     Ok(())
//! }
//! ```

use latchkey_core::{ClearBeforeSet, Error, NodeId, constants::DEFAULT_SLOT_CEILING};
use latchkey_driver::DriverError;
use latchkey_session::SessionManager;
use latchkey_store::CodeStore;
use std::collections::HashMap;
use std::time::Duration;

pub mod codes;
pub mod inspect;
pub mod lock;

pub use codes::{DeleteCodeReport, SetCodeReport, SlotEntry};
pub use inspect::NodeReport;
pub use lock::LockReport;

/// Tunables for the command workflows.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Wait between the user-code write and the verification read, giving
    /// the lock time to commit the code to non-volatile storage.
    pub settle_delay: Duration,

    /// Slot enumeration ceiling when the device does not report its own
    /// slot count.
    pub slot_ceiling: u8,

    /// Default clear-before-set policy.
    pub clear_before_set: ClearBeforeSet,

    /// Per-node overrides of the clear-before-set policy.
    pub clear_before_set_overrides: HashMap<NodeId, ClearBeforeSet>,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(
                latchkey_core::constants::DEFAULT_SETTLE_DELAY_SECS,
            ),
            slot_ceiling: DEFAULT_SLOT_CEILING,
            clear_before_set: ClearBeforeSet::default(),
            clear_before_set_overrides: HashMap::new(),
        }
    }
}

impl WorkflowOptions {
    /// Effective clear-before-set policy for a node.
    #[must_use]
    pub fn clear_policy(&self, node_id: NodeId) -> ClearBeforeSet {
        self.clear_before_set_overrides
            .get(&node_id)
            .copied()
            .unwrap_or(self.clear_before_set)
    }
}

/// The lock controller's command surface.
///
/// Presentation adapters construct one of these and call its methods; the
/// session brings the driver connection up on first use.
pub struct LockCommands {
    session: SessionManager,
    store: CodeStore,
    opts: WorkflowOptions,
}

impl LockCommands {
    /// Bundle a session, a code store, and workflow options into a command
    /// surface.
    #[must_use]
    pub fn new(session: SessionManager, store: CodeStore, opts: WorkflowOptions) -> Self {
        Self {
            session,
            store,
            opts,
        }
    }

    /// The underlying code store, for read-only listing by adapters.
    #[must_use]
    pub fn store(&self) -> &CodeStore {
        &self.store
    }

    /// The session manager, for lifecycle control and event subscriptions.
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }
}

/// Map a driver error onto the workspace error taxonomy.
///
/// Transport conditions become `Unreachable` (retry later); an unknown node
/// stays a lookup miss; anything else is a permanent capability or
/// configuration problem.
pub(crate) fn driver_error(err: DriverError) -> Error {
    match err {
        DriverError::NodeNotFound { node_id } => Error::not_found(format!("node {node_id}")),
        err if err.is_transport() => Error::unreachable(err.to_string()),
        err => Error::config(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_policy_override() {
        let node = NodeId::new(8).unwrap();
        let other = NodeId::new(9).unwrap();

        let mut opts = WorkflowOptions::default();
        opts.clear_before_set_overrides
            .insert(node, ClearBeforeSet::Always);

        assert_eq!(opts.clear_policy(node), ClearBeforeSet::Always);
        assert_eq!(opts.clear_policy(other), ClearBeforeSet::Never);
    }

    #[test]
    fn test_driver_error_mapping() {
        let err = driver_error(DriverError::timeout(2000));
        assert!(matches!(err, Error::Unreachable(_)));

        let err = driver_error(DriverError::node_not_found(99));
        assert!(matches!(err, Error::NotFound(_)));

        let err = driver_error(DriverError::unsupported("user codes"));
        assert!(matches!(err, Error::Config(_)));
    }
}
