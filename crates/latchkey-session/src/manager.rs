//! Connection lifecycle management.
//!
//! A [`SessionManager`] owns at most one driver connection process-wide and
//! runs the reconnect state machine around it:
//!
//! ```text
//! Disconnected ──connect──> Connecting ──success──> Ready
//!      ^                        │                     │
//!      └───────failure──────────┘      transport failure / release
//! ```
//!
//! Connection attempts are serialized by a guard flag, so at any instant
//! there is at most one attempt in flight or one reconnect timer pending.
//! Failed attempts retry on a fixed delay; transport failures reported by
//! the driver's event stream flip `Ready` back to `Disconnected` and
//! schedule a reconnect. `release()` is terminal.

use crate::config::ControllerConfig;
use crate::events::{EventHub, NodeSubscription};
use latchkey_core::{
    Error, NodeId, Result,
    constants::{DEFAULT_READY_TIMEOUT_SECS, DEFAULT_RECONNECT_DELAY_SECS},
};
use latchkey_driver::{AnyLockDriver, DriverEvent, LockDriver};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, mpsc, watch};
use tracing::{debug, error, info, warn};

/// Lifecycle state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection; an attempt may be scheduled.
    Disconnected,

    /// A connection attempt is in flight.
    Connecting,

    /// The driver is connected and serving commands.
    Ready,

    /// The session was released. Terminal.
    ShutDown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Ready => write!(f, "ready"),
            Self::ShutDown => write!(f, "shut down"),
        }
    }
}

/// Tunables for the session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Upper bound on how long `acquire()` waits for readiness.
    pub ready_timeout: Duration,

    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
        }
    }
}

struct Inner {
    driver: Mutex<AnyLockDriver>,
    state_tx: watch::Sender<SessionState>,
    hub: EventHub,
    reconnect_delay: Duration,

    /// True while a connect attempt is in flight or a reconnect timer is
    /// pending. Guards against timer storms: whoever flips this false→true
    /// owns the next attempt.
    attempt_pending: AtomicBool,

    /// Latched fatal error message. Once set, no further attempts are made.
    fatal: std::sync::Mutex<Option<String>>,
}

impl Inner {
    /// Apply a state transition unless the session is already shut down.
    /// Returns `false` when shut down.
    fn transition(&self, next: SessionState) -> bool {
        let mut shut_down = false;
        self.state_tx.send_if_modified(|state| {
            if *state == SessionState::ShutDown {
                shut_down = true;
                return false;
            }
            if *state == next {
                return false;
            }
            debug!(from = %state, to = %next, "session state change");
            *state = next;
            true
        });
        !shut_down
    }

    fn fatal_error(&self) -> Option<Error> {
        self.fatal
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .map(Error::config)
    }

    fn latch_fatal(&self, message: String) {
        if let Ok(mut guard) = self.fatal.lock() {
            guard.get_or_insert(message);
        }
    }

    /// Spawn a connect attempt unless one is already pending or the session
    /// cannot accept one.
    fn spawn_connect_if_idle(self: &Arc<Self>, initial_delay: Option<Duration>) {
        if self
            .attempt_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if *self.state_tx.borrow() == SessionState::ShutDown || self.fatal_error().is_some() {
            self.attempt_pending.store(false, Ordering::Release);
            return;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run_connect_loop(initial_delay).await;
        });
    }

    /// Attempt to connect, retrying transport failures on a fixed delay.
    /// Holds `attempt_pending` for the whole loop.
    async fn run_connect_loop(self: Arc<Self>, initial_delay: Option<Duration>) {
        if let Some(delay) = initial_delay {
            tokio::time::sleep(delay).await;
        }

        loop {
            if !self.transition(SessionState::Connecting) {
                break;
            }

            // A shutdown must never wait behind a hung connect: racing the
            // attempt against the state channel drops the driver guard as
            // soon as `release()` flips the state.
            let mut shutdown = self.state_tx.subscribe();
            let attempt = {
                let mut driver = self.driver.lock().await;
                tokio::select! {
                    result = driver.connect() => match result {
                        Ok(()) => Ok(driver.take_events()),
                        Err(err) => Err(err),
                    },
                    _ = shutdown.wait_for(|state| *state == SessionState::ShutDown) => {
                        debug!("connect attempt abandoned by shutdown");
                        break;
                    }
                }
            };

            match attempt {
                Ok(events) => {
                    if let Some(rx) = events {
                        self.spawn_pump(rx);
                    }
                    if self.transition(SessionState::Ready) {
                        info!("driver connection ready");
                    }
                    break;
                }
                Err(err) if err.is_transport() => {
                    warn!(
                        %err,
                        retry_in_secs = self.reconnect_delay.as_secs(),
                        "connect attempt failed, retrying"
                    );
                    if !self.transition(SessionState::Disconnected) {
                        break;
                    }
                    tokio::time::sleep(self.reconnect_delay).await;
                }
                Err(err) => {
                    error!(%err, "fatal connect error, not retrying");
                    self.latch_fatal(err.to_string());
                    self.transition(SessionState::Disconnected);
                    break;
                }
            }
        }

        self.attempt_pending.store(false, Ordering::Release);
    }

    /// Drain one connection's event stream into the hub.
    ///
    /// One pump per connection; events are forwarded in arrival order.
    fn spawn_pump(self: &Arc<Self>, mut rx: mpsc::Receiver<DriverEvent>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let transport_failed = event.is_transport_failure();
                inner.hub.publish(event);
                if transport_failed {
                    inner.on_transport_failure();
                    break;
                }
            }
            debug!("event pump finished");
        });
    }

    fn on_transport_failure(self: &Arc<Self>) {
        warn!("transport failure reported, scheduling reconnect");
        if !self.transition(SessionState::Disconnected) {
            return;
        }
        self.spawn_connect_if_idle(Some(self.reconnect_delay));
    }
}

/// Manages the single driver connection and its lifecycle.
///
/// Cheap to clone; all clones share the same connection and state machine.
///
/// # Examples
///
/// ```
/// use latchkey_driver::AnyLockDriver;
/// use latchkey_driver::mock::MockDriver;
/// use latchkey_session::{SessionManager, SessionOptions, SessionState};
///
/// #[tokio::main]
/// async fn main() -> latchkey_core::Result<()> {
///     let (driver, handle) = MockDriver::new();
///     handle.add_node(latchkey_core::NodeId::new(8).unwrap());
///
///     let manager = SessionManager::new(AnyLockDriver::Mock(driver), SessionOptions::default());
///     let session = manager.acquire().await?;
///     assert_eq!(session.state(), SessionState::Ready);
///
///     manager.release().await;
///     assert!(manager.acquire().await.is_err());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
    state_rx: watch::Receiver<SessionState>,
    ready_timeout: Duration,
}

impl SessionManager {
    /// Create a manager around a driver. No connection is attempted until
    /// the first `acquire()`.
    #[must_use]
    pub fn new(driver: AnyLockDriver, opts: SessionOptions) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let inner = Arc::new(Inner {
            driver: Mutex::new(driver),
            state_tx,
            hub: EventHub::new(),
            reconnect_delay: opts.reconnect_delay,
            attempt_pending: AtomicBool::new(false),
            fatal: std::sync::Mutex::new(None),
        });
        Self {
            inner,
            state_rx,
            ready_timeout: opts.ready_timeout,
        }
    }

    /// Create a manager, validating the controller configuration first.
    ///
    /// A missing serial port is latched as a fatal error: the first
    /// `acquire()` surfaces it and no connection is ever attempted.
    #[must_use]
    pub fn with_config(
        config: &ControllerConfig,
        driver: AnyLockDriver,
        opts: SessionOptions,
    ) -> Self {
        let manager = Self::new(driver, opts);
        if let Err(err) = config.require_serial_port() {
            manager.inner.latch_fatal(err.to_string());
        }
        manager
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch channel for lifecycle state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Subscribe to driver events for a node. Valid across reconnects.
    #[must_use]
    pub fn subscribe(&self, node_id: NodeId) -> NodeSubscription {
        self.inner.hub.subscribe(node_id)
    }

    /// Get a handle to a ready connection.
    ///
    /// Returns immediately when the session is already `Ready`; otherwise
    /// ensures a connection attempt is scheduled and waits for readiness,
    /// bounded by `ready_timeout`.
    ///
    /// # Errors
    ///
    /// - `ReadyTimeout` when readiness is not reached in time. The reconnect
    ///   machinery keeps running; a later call may succeed.
    /// - `Config` when a fatal configuration error is latched. Never retried.
    /// - `ShutDown` after `release()`.
    pub async fn acquire(&self) -> Result<SessionHandle> {
        let mut rx = self.state_rx.clone();
        match *rx.borrow_and_update() {
            SessionState::ShutDown => return Err(Error::ShutDown),
            SessionState::Ready => return Ok(self.handle()),
            SessionState::Disconnected | SessionState::Connecting => {}
        }
        if let Some(err) = self.inner.fatal_error() {
            return Err(err);
        }
        self.inner.spawn_connect_if_idle(None);

        let wait = async {
            loop {
                rx.changed().await.map_err(|_| Error::ShutDown)?;
                match *rx.borrow_and_update() {
                    SessionState::Ready => return Ok(()),
                    SessionState::ShutDown => return Err(Error::ShutDown),
                    SessionState::Disconnected | SessionState::Connecting => {
                        if let Some(err) = self.inner.fatal_error() {
                            return Err(err);
                        }
                    }
                }
            }
        };
        match tokio::time::timeout(self.ready_timeout, wait).await {
            Ok(Ok(())) => Ok(self.handle()),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::ReadyTimeout {
                timeout_secs: self.ready_timeout.as_secs(),
            }),
        }
    }

    /// Shut the session down. Idempotent and terminal.
    ///
    /// Pending reconnect timers observe the `ShutDown` state and cancel
    /// themselves, and an in-flight connect attempt is abandoned; the
    /// driver is disconnected once any in-flight command releases it.
    pub async fn release(&self) {
        let previous = self.inner.state_tx.send_replace(SessionState::ShutDown);
        if previous == SessionState::ShutDown {
            return;
        }
        info!("session released");

        let mut driver = self.inner.driver.lock().await;
        if let Err(err) = driver.disconnect().await {
            warn!(%err, "disconnect during release failed");
        }
    }

    fn handle(&self) -> SessionHandle {
        SessionHandle {
            inner: Arc::clone(&self.inner),
            state_rx: self.state_rx.clone(),
        }
    }
}

/// Handle to an acquired session.
///
/// Commands lock the shared driver through the handle; the mutex is what
/// serializes concurrent callers onto the single transport.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Exclusive access to the driver for one command exchange.
    pub async fn driver(&self) -> MutexGuard<'_, AnyLockDriver> {
        self.inner.driver.lock().await
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to driver events for a node.
    #[must_use]
    pub fn subscribe(&self, node_id: NodeId) -> NodeSubscription {
        self.inner.hub.subscribe(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use latchkey_driver::NotificationKind;
    use latchkey_driver::mock::{MockDriver, MockDriverHandle};

    fn node() -> NodeId {
        NodeId::new(8).unwrap()
    }

    fn manager(opts: SessionOptions) -> (SessionManager, MockDriverHandle) {
        let (driver, handle) = MockDriver::new();
        handle.add_node(node());
        let manager = SessionManager::new(AnyLockDriver::Mock(driver), opts);
        (manager, handle)
    }

    #[tokio::test]
    async fn test_acquire_connects_and_reports_ready() {
        let (manager, handle) = manager(SessionOptions::default());
        assert_eq!(manager.state(), SessionState::Disconnected);

        let session = manager.acquire().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert!(handle.is_connected());
        assert_eq!(handle.connect_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_then_success_yield_one_ready() {
        let (manager, handle) = manager(SessionOptions::default());
        handle.fail_connects(2);

        let session = manager.acquire().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        // Two scripted failures, each followed by one delayed retry.
        assert_eq!(handle.connect_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_share_one_attempt() {
        let (manager, handle) = manager(SessionOptions::default());
        handle.fail_connects(1);

        let (a, b, c) = tokio::join!(manager.acquire(), manager.acquire(), manager.acquire());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        // One failure plus one successful retry, no matter how many waiters.
        assert_eq!(handle.connect_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_times_out() {
        let (manager, handle) = manager(SessionOptions::default());
        handle.set_never_ready(true);

        let result = manager.acquire().await;
        assert!(matches!(result, Err(Error::ReadyTimeout { timeout_secs: 60 })));
        assert_eq!(manager.state(), SessionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_completes_while_connect_is_hung() {
        let (manager, handle) = manager(SessionOptions::default());
        handle.set_never_ready(true);

        let result = manager.acquire().await;
        assert!(matches!(result, Err(Error::ReadyTimeout { .. })));

        // The hung attempt still holds the driver; release must abandon it
        // rather than wait behind it.
        tokio::time::timeout(Duration::from_secs(300), manager.release())
            .await
            .expect("release blocked behind a hung connect attempt");
        assert_eq!(manager.state(), SessionState::ShutDown);
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_terminal() {
        let (manager, handle) = manager(SessionOptions::default());
        manager.acquire().await.unwrap();

        manager.release().await;
        manager.release().await;
        assert_eq!(manager.state(), SessionState::ShutDown);
        assert!(!handle.is_connected());

        let result = manager.acquire().await;
        assert!(matches!(result, Err(Error::ShutDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_triggers_reconnect() {
        let (manager, handle) = manager(SessionOptions::default());
        let mut states = manager.watch_state();
        manager.acquire().await.unwrap();

        handle.emit_transport_failure("serial adapter unplugged");

        let mut saw_disconnected = false;
        loop {
            states.changed().await.unwrap();
            match *states.borrow_and_update() {
                SessionState::Disconnected => saw_disconnected = true,
                SessionState::Ready if saw_disconnected => break,
                _ => {}
            }
        }
        assert_eq!(handle.connect_attempts(), 2);
        assert!(handle.is_connected());
    }

    #[tokio::test]
    async fn test_missing_serial_port_is_fatal() {
        let (driver, handle) = MockDriver::new();
        let manager = SessionManager::with_config(
            &ControllerConfig::default(),
            AnyLockDriver::Mock(driver),
            SessionOptions::default(),
        );

        let result = manager.acquire().await;
        assert!(matches!(result, Err(Error::Config(_))));

        // Fatal errors are never retried: no attempt was ever made.
        let result = manager.acquire().await;
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(handle.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_events_flow_through_subscription() {
        let (manager, handle) = manager(SessionOptions::default());
        let session = manager.acquire().await.unwrap();
        let mut sub = session.subscribe(node());

        handle.inject_event(DriverEvent::Notification {
            node_id: node(),
            kind: NotificationKind::KeypadUnlock,
            at: Utc::now(),
        });

        let event = sub.next().await.unwrap();
        assert!(matches!(
            event,
            DriverEvent::Notification {
                kind: NotificationKind::KeypadUnlock,
                ..
            }
        ));
    }
}
