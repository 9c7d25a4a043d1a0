//! Node inspection.

use crate::{LockCommands, driver_error};
use latchkey_core::{
    DoorMode, Error, NodeId, Result, constants::DEFAULT_INTERVIEW_TIMEOUT_SECS,
};
use latchkey_driver::{InterviewStatus, LockDriver, NodeSummary};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// How long one driver poll may hold the shared driver during an
/// interview wait.
const INTERVIEW_POLL_SLICE: Duration = Duration::from_secs(1);

/// Best-effort snapshot of a node.
///
/// Every field is queried independently; a failed query leaves its field
/// `None` instead of failing the whole report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node_id: NodeId,
    pub summary: Option<NodeSummary>,
    pub battery: Option<u8>,
    pub door: Option<DoorMode>,
}

impl LockCommands {
    /// Query a node's metadata, battery level, and door mode.
    ///
    /// # Errors
    /// `NotFound` for an unknown node, plus session-level failures.
    pub async fn node_status(&self, node_id: NodeId) -> Result<NodeReport> {
        let session = self.session.acquire().await?;
        let mut driver = session.driver().await;

        if !driver.node_exists(node_id).await.map_err(driver_error)? {
            return Err(Error::not_found(format!("node {node_id}")));
        }

        let summary = match driver.node_summary(node_id).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                warn!(%node_id, %err, "node summary query failed");
                None
            }
        };
        let battery = match driver.battery_level(node_id).await {
            Ok(level) => level,
            Err(err) => {
                warn!(%node_id, %err, "battery query failed");
                None
            }
        };
        let door = match driver.door_lock_get(node_id).await {
            Ok(mode) => Some(mode),
            Err(err) => {
                warn!(%node_id, %err, "door mode query failed");
                None
            }
        };

        Ok(NodeReport {
            node_id,
            summary,
            battery,
            door,
        })
    }

    /// Wait for a node's interview to complete, bounded by `timeout`
    /// (default 60 s).
    ///
    /// Resolves to [`InterviewStatus::Incomplete`] on expiry; the node may
    /// still finish afterwards. The wait is sliced into short driver polls
    /// and the driver is released between them, so a long interview never
    /// blocks other commands on the shared transport.
    ///
    /// # Errors
    /// `NotFound` for an unknown node, `Unreachable` when the connection
    /// drops during the wait.
    pub async fn wait_for_interview(
        &self,
        node_id: NodeId,
        timeout: Option<Duration>,
    ) -> Result<InterviewStatus> {
        let timeout = timeout.unwrap_or(Duration::from_secs(DEFAULT_INTERVIEW_TIMEOUT_SECS));
        let session = self.session.acquire().await?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let slice = remaining.min(INTERVIEW_POLL_SLICE);
            let status = {
                let driver = session.driver().await;
                driver
                    .wait_for_interview(node_id, slice)
                    .await
                    .map_err(driver_error)?
            };
            if status != InterviewStatus::Incomplete || remaining <= INTERVIEW_POLL_SLICE {
                return Ok(status);
            }
        }
    }
}
