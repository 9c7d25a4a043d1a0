//! Door lock and unlock commands.

use crate::{LockCommands, driver_error};
use latchkey_core::{DoorMode, Error, NodeId, Result};
use latchkey_driver::LockDriver;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of a lock or unlock command.
///
/// `acknowledged` reflects the command acknowledgment, which is the success
/// signal for door operations. The mode read-back is best-effort; `None`
/// means the read failed, not that the command did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockReport {
    pub acknowledged: bool,
    pub mode: Option<DoorMode>,
}

impl LockCommands {
    /// Secure the door bolt.
    ///
    /// # Errors
    /// `NotFound` for an unknown node, `Unreachable` when the command is not
    /// acknowledged at the transport level.
    pub async fn lock(&self, node_id: NodeId) -> Result<LockReport> {
        self.set_door_mode(node_id, DoorMode::Secured).await
    }

    /// Retract the door bolt.
    ///
    /// # Errors
    /// Same conditions as [`lock`](Self::lock).
    pub async fn unlock(&self, node_id: NodeId) -> Result<LockReport> {
        self.set_door_mode(node_id, DoorMode::Unsecured).await
    }

    async fn set_door_mode(&self, node_id: NodeId, mode: DoorMode) -> Result<LockReport> {
        let session = self.session.acquire().await?;
        let mut driver = session.driver().await;

        if !driver.node_exists(node_id).await.map_err(driver_error)? {
            return Err(Error::not_found(format!("node {node_id}")));
        }

        driver
            .door_lock_set(node_id, mode)
            .await
            .map_err(driver_error)?;
        info!(%node_id, %mode, "door command acknowledged");

        let mode = match driver.door_lock_get(node_id).await {
            Ok(mode) => Some(mode),
            Err(err) => {
                warn!(%node_id, %err, "door mode read-back failed");
                None
            }
        };

        Ok(LockReport {
            acknowledged: true,
            mode,
        })
    }
}
