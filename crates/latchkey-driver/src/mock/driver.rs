//! Scriptable mock driver.
//!
//! The mock mirrors the behaviors that make the real hardware hard to work
//! with so the session and workflow layers can be tested against them:
//!
//! - connects can be scripted to fail N times before succeeding, or to hang
//!   past any readiness timeout;
//! - a node can be marked *silent-ignore*, acknowledging user-code writes
//!   while leaving the slot untouched (the real lock does this for duplicate
//!   or policy-violating codes);
//! - a node can be marked *sleepy*, timing out on reads;
//! - transport failures can be injected mid-session through the event
//!   stream.

use crate::error::{DriverError, Result};
use crate::traits::{
    DriverEvent, InterviewStatus, LockDriver, NodeSummary, SecurityClass,
};
use latchkey_core::{CodeSlot, DoorMode, NodeId, PinCode, SlotStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Simulated read timeout reported by sleepy nodes, in milliseconds.
const SLEEPY_TIMEOUT_MS: u64 = 2000;

/// Event channel capacity per connection.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Interview wait poll interval.
const INTERVIEW_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
struct MockSlot {
    status: SlotStatus,
    pin: Option<String>,
}

#[derive(Debug, Clone)]
struct MockNode {
    door: DoorMode,
    slots: HashMap<CodeSlot, MockSlot>,
    slot_count: Option<u8>,
    battery: Option<u8>,
    sleepy: bool,
    silent_ignore: bool,
    interview: InterviewStatus,
    security: Option<SecurityClass>,
    manufacturer: Option<String>,
    product: Option<String>,
}

impl Default for MockNode {
    fn default() -> Self {
        Self {
            door: DoorMode::Secured,
            slots: HashMap::new(),
            slot_count: None,
            battery: Some(100),
            sleepy: false,
            silent_ignore: false,
            interview: InterviewStatus::Complete,
            security: Some(SecurityClass::S0Legacy),
            manufacturer: Some("Mock Locks Inc.".to_string()),
            product: Some("Mock Deadbolt".to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    connect_attempts: u32,
    connect_failures_remaining: u32,
    never_ready: bool,
    event_tx: Option<mpsc::Sender<DriverEvent>>,
    nodes: HashMap<NodeId, MockNode>,
}

impl MockState {
    fn node(&self, node_id: NodeId) -> Result<&MockNode> {
        self.nodes
            .get(&node_id)
            .ok_or_else(|| DriverError::node_not_found(node_id.as_u8()))
    }

    fn node_mut(&mut self, node_id: NodeId) -> Result<&mut MockNode> {
        self.nodes
            .get_mut(&node_id)
            .ok_or_else(|| DriverError::node_not_found(node_id.as_u8()))
    }

    fn require_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }
}

/// Mock Z-Wave driver.
///
/// Created together with a [`MockDriverHandle`] that scripts its behavior.
///
/// # Examples
///
/// ```
/// use latchkey_driver::mock::MockDriver;
/// use latchkey_driver::traits::LockDriver;
/// use latchkey_core::{CodeSlot, NodeId, PinCode, SlotStatus};
///
/// #[tokio::main]
/// async fn main() -> latchkey_driver::Result<()> {
///     let (mut driver, handle) = MockDriver::new();
///     let node = NodeId::new(8).unwrap();
///     let slot = CodeSlot::new(3).unwrap();
///     handle.add_node(node);
///
///     driver.connect().await?;
///     let pin = PinCode::new("4321").unwrap();
///     driver.user_code_set(node, slot, &pin).await?;
///     assert_eq!(driver.user_code_status(node, slot).await?, SlotStatus::Occupied);
///     assert_eq!(handle.slot_pin(node, slot), Some("4321".to_string()));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,

    /// Event receiver for the current connection, handed out once.
    pending_events: Option<mpsc::Receiver<DriverEvent>>,
}

impl MockDriver {
    /// Create a new mock driver and its control handle.
    pub fn new() -> (Self, MockDriverHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let driver = Self {
            state: Arc::clone(&state),
            pending_events: None,
        };
        (driver, MockDriverHandle { state })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock driver state lock poisoned")
    }
}

impl LockDriver for MockDriver {
    async fn connect(&mut self) -> Result<()> {
        let never_ready = {
            let mut state = self.lock();
            state.connect_attempts += 1;

            if state.connect_failures_remaining > 0 {
                state.connect_failures_remaining -= 1;
                return Err(DriverError::connect_failed("scripted connect failure"));
            }

            state.never_ready
        };

        if never_ready {
            // Simulates a driver that never reaches readiness; the caller's
            // readiness timeout is the only way out.
            std::future::pending::<()>().await;
            unreachable!();
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        {
            let mut state = self.lock();
            state.event_tx = Some(tx);
            state.connected = true;
        }
        self.pending_events = Some(rx);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.connected = false;
        state.event_tx = None;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.lock().connected
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<DriverEvent>> {
        self.pending_events.take()
    }

    async fn node_exists(&self, node_id: NodeId) -> Result<bool> {
        let state = self.lock();
        state.require_connected()?;
        Ok(state.nodes.contains_key(&node_id))
    }

    async fn door_lock_set(&mut self, node_id: NodeId, mode: DoorMode) -> Result<()> {
        let mut state = self.lock();
        state.require_connected()?;
        state.node_mut(node_id)?.door = mode;
        Ok(())
    }

    async fn door_lock_get(&mut self, node_id: NodeId) -> Result<DoorMode> {
        let state = self.lock();
        state.require_connected()?;
        let node = state.node(node_id)?;
        if node.sleepy {
            return Err(DriverError::timeout(SLEEPY_TIMEOUT_MS));
        }
        Ok(node.door)
    }

    async fn user_code_set(
        &mut self,
        node_id: NodeId,
        slot: CodeSlot,
        pin: &PinCode,
    ) -> Result<()> {
        let mut state = self.lock();
        state.require_connected()?;
        let node = state.node_mut(node_id)?;

        // Silent-ignore models the real lock: the command is acknowledged at
        // the transport level but the slot does not change.
        if !node.silent_ignore {
            node.slots.insert(
                slot,
                MockSlot {
                    status: SlotStatus::Occupied,
                    pin: Some(pin.as_str().to_string()),
                },
            );
        }
        Ok(())
    }

    async fn user_code_clear(&mut self, node_id: NodeId, slot: CodeSlot) -> Result<()> {
        let mut state = self.lock();
        state.require_connected()?;
        let node = state.node_mut(node_id)?;
        node.slots.insert(
            slot,
            MockSlot {
                status: SlotStatus::Available,
                pin: None,
            },
        );
        Ok(())
    }

    async fn user_code_status(&mut self, node_id: NodeId, slot: CodeSlot) -> Result<SlotStatus> {
        let state = self.lock();
        state.require_connected()?;
        let node = state.node(node_id)?;
        if node.sleepy {
            return Err(DriverError::timeout(SLEEPY_TIMEOUT_MS));
        }
        Ok(node
            .slots
            .get(&slot)
            .map(|s| s.status)
            .unwrap_or(SlotStatus::Available))
    }

    async fn user_code_slot_count(&mut self, node_id: NodeId) -> Result<Option<u8>> {
        let state = self.lock();
        state.require_connected()?;
        Ok(state.node(node_id)?.slot_count)
    }

    async fn battery_level(&mut self, node_id: NodeId) -> Result<Option<u8>> {
        let state = self.lock();
        state.require_connected()?;
        let node = state.node(node_id)?;
        if node.sleepy {
            return Err(DriverError::timeout(SLEEPY_TIMEOUT_MS));
        }
        Ok(node.battery)
    }

    async fn node_summary(&self, node_id: NodeId) -> Result<NodeSummary> {
        let state = self.lock();
        state.require_connected()?;
        let node = state.node(node_id)?;
        Ok(NodeSummary {
            node_id,
            ready: !node.sleepy,
            interview: node.interview,
            security: node.security,
            manufacturer: node.manufacturer.clone(),
            product: node.product.clone(),
        })
    }

    async fn wait_for_interview(
        &self,
        node_id: NodeId,
        timeout: Duration,
    ) -> Result<InterviewStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let state = self.lock();
                state.require_connected()?;
                let node = state.node(node_id)?;
                if node.interview == InterviewStatus::Complete {
                    return Ok(InterviewStatus::Complete);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(InterviewStatus::Incomplete);
            }
            tokio::time::sleep(INTERVIEW_POLL_INTERVAL).await;
        }
    }
}

/// Handle for scripting a [`MockDriver`].
///
/// Can be cloned and used from tests while the driver is owned by a session.
#[derive(Debug, Clone)]
pub struct MockDriverHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockDriverHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock driver state lock poisoned")
    }

    /// Register a node with default lock-like metadata.
    pub fn add_node(&self, node_id: NodeId) {
        self.lock().nodes.insert(node_id, MockNode::default());
    }

    /// Remove a node from the simulated network.
    pub fn remove_node(&self, node_id: NodeId) {
        self.lock().nodes.remove(&node_id);
    }

    /// Script the next `n` connect attempts to fail.
    pub fn fail_connects(&self, n: u32) {
        self.lock().connect_failures_remaining = n;
    }

    /// When set, `connect()` hangs forever instead of completing.
    pub fn set_never_ready(&self, never_ready: bool) {
        self.lock().never_ready = never_ready;
    }

    /// Make the node acknowledge user-code writes without applying them.
    pub fn set_silent_ignore(&self, node_id: NodeId, silent: bool) {
        if let Some(node) = self.lock().nodes.get_mut(&node_id) {
            node.silent_ignore = silent;
        }
    }

    /// Make the node time out on reads.
    pub fn set_sleepy(&self, node_id: NodeId, sleepy: bool) {
        if let Some(node) = self.lock().nodes.get_mut(&node_id) {
            node.sleepy = sleepy;
        }
    }

    /// Pre-load a slot status (and optional plaintext PIN) on a node.
    pub fn set_slot(&self, node_id: NodeId, slot: CodeSlot, status: SlotStatus, pin: Option<&str>) {
        if let Some(node) = self.lock().nodes.get_mut(&node_id) {
            node.slots.insert(
                slot,
                MockSlot {
                    status,
                    pin: pin.map(str::to_string),
                },
            );
        }
    }

    /// Set the device-reported user-code slot count.
    pub fn set_slot_count(&self, node_id: NodeId, count: Option<u8>) {
        if let Some(node) = self.lock().nodes.get_mut(&node_id) {
            node.slot_count = count;
        }
    }

    /// Set the reported battery level.
    pub fn set_battery(&self, node_id: NodeId, level: Option<u8>) {
        if let Some(node) = self.lock().nodes.get_mut(&node_id) {
            node.battery = level;
        }
    }

    /// Set the interview status reported for the node.
    pub fn set_interview(&self, node_id: NodeId, status: InterviewStatus) {
        if let Some(node) = self.lock().nodes.get_mut(&node_id) {
            node.interview = status;
        }
    }

    /// Set the granted security class reported for the node.
    pub fn set_security(&self, node_id: NodeId, security: Option<SecurityClass>) {
        if let Some(node) = self.lock().nodes.get_mut(&node_id) {
            node.security = security;
        }
    }

    /// Inject an event into the current connection's event stream.
    ///
    /// Silently dropped when no connection is established.
    pub fn inject_event(&self, event: DriverEvent) {
        let tx = self.lock().event_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.try_send(event);
        }
    }

    /// Simulate a fatal transport failure: the connection drops and a
    /// `TransportFailed` event is emitted.
    pub fn emit_transport_failure(&self, reason: impl Into<String>) {
        let tx = {
            let mut state = self.lock();
            state.connected = false;
            state.event_tx.take()
        };
        if let Some(tx) = tx {
            let _ = tx.try_send(DriverEvent::TransportFailed {
                reason: reason.into(),
            });
        }
    }

    /// Plaintext PIN last written to a slot, for test assertions.
    #[must_use]
    pub fn slot_pin(&self, node_id: NodeId, slot: CodeSlot) -> Option<String> {
        self.lock()
            .nodes
            .get(&node_id)
            .and_then(|n| n.slots.get(&slot))
            .and_then(|s| s.pin.clone())
    }

    /// Current door mode of a node, for test assertions.
    #[must_use]
    pub fn door_mode(&self, node_id: NodeId) -> Option<DoorMode> {
        self.lock().nodes.get(&node_id).map(|n| n.door)
    }

    /// Number of connect attempts made so far (including failed ones).
    #[must_use]
    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    /// Whether the driver currently reports a live connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }
}
