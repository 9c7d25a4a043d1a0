//! Enum wrapper for driver backend dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) are not object-safe,
//! so `Box<dyn LockDriver>` is not available. This enum provides concrete
//! type dispatch at compile time instead: zero-cost abstraction, type-safe
//! extensibility, and room for feature-gated real backends.
//!
//! # Examples
//!
//! ```
//! use latchkey_driver::drivers::AnyLockDriver;
//! use latchkey_driver::mock::MockDriver;
//!
//! let (driver, _handle) = MockDriver::new();
//! let any_driver = AnyLockDriver::Mock(driver);
//! ```

use crate::error::Result;
use crate::mock::MockDriver;
use crate::traits::{DriverEvent, InterviewStatus, LockDriver, NodeSummary};
use latchkey_core::{CodeSlot, DoorMode, NodeId, PinCode, SlotStatus};
use std::time::Duration;
use tokio::sync::mpsc;

/// Enum wrapper for lock driver dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLockDriver {
    /// Mock driver for development and testing.
    Mock(MockDriver),
    // Planned variants behind the driver-* feature flags:
    // - Serial(SerialDriver) - local serial controller stick
    // - Ws(WsDriver) - remote driver over websocket
}

impl LockDriver for AnyLockDriver {
    async fn connect(&mut self) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.connect().await,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.disconnect().await,
        }
    }

    fn is_ready(&self) -> bool {
        match self {
            Self::Mock(driver) => driver.is_ready(),
        }
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<DriverEvent>> {
        match self {
            Self::Mock(driver) => driver.take_events(),
        }
    }

    async fn node_exists(&self, node_id: NodeId) -> Result<bool> {
        match self {
            Self::Mock(driver) => driver.node_exists(node_id).await,
        }
    }

    async fn door_lock_set(&mut self, node_id: NodeId, mode: DoorMode) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.door_lock_set(node_id, mode).await,
        }
    }

    async fn door_lock_get(&mut self, node_id: NodeId) -> Result<DoorMode> {
        match self {
            Self::Mock(driver) => driver.door_lock_get(node_id).await,
        }
    }

    async fn user_code_set(
        &mut self,
        node_id: NodeId,
        slot: CodeSlot,
        pin: &PinCode,
    ) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.user_code_set(node_id, slot, pin).await,
        }
    }

    async fn user_code_clear(&mut self, node_id: NodeId, slot: CodeSlot) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.user_code_clear(node_id, slot).await,
        }
    }

    async fn user_code_status(&mut self, node_id: NodeId, slot: CodeSlot) -> Result<SlotStatus> {
        match self {
            Self::Mock(driver) => driver.user_code_status(node_id, slot).await,
        }
    }

    async fn user_code_slot_count(&mut self, node_id: NodeId) -> Result<Option<u8>> {
        match self {
            Self::Mock(driver) => driver.user_code_slot_count(node_id).await,
        }
    }

    async fn battery_level(&mut self, node_id: NodeId) -> Result<Option<u8>> {
        match self {
            Self::Mock(driver) => driver.battery_level(node_id).await,
        }
    }

    async fn node_summary(&self, node_id: NodeId) -> Result<NodeSummary> {
        match self {
            Self::Mock(driver) => driver.node_summary(node_id).await,
        }
    }

    async fn wait_for_interview(
        &self,
        node_id: NodeId,
        timeout: Duration,
    ) -> Result<InterviewStatus> {
        match self {
            Self::Mock(driver) => driver.wait_for_interview(node_id, timeout).await,
        }
    }
}
