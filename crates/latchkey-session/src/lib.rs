//! Connection lifecycle, controller configuration, and event fan-out for the
//! latchkey lock controller.
//!
//! The session layer owns the single driver connection: it brings it up on
//! first use, watches it for transport failures, and reconnects on a fixed
//! delay. Everything above (the commands crate) borrows the connection
//! through a [`SessionHandle`] and never manages it directly.
//!
//! # Example
//!
//! ```
//! use latchkey_driver::AnyLockDriver;
//! use latchkey_driver::mock::MockDriver;
//! use latchkey_session::{SessionManager, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> latchkey_core::Result<()> {
//!     let (driver, handle) = MockDriver::new();
//!     let node = latchkey_core::NodeId::new(8).unwrap();
//!     handle.add_node(node);
//!
//!     let manager = SessionManager::new(AnyLockDriver::Mock(driver), SessionOptions::default());
//!     let session = manager.acquire().await?;
//!     let _events = session.subscribe(node);
//!
//!     // ... issue commands through session.driver().await ...
//!
//!     manager.release().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod events;
pub mod manager;

pub use config::{ControllerConfig, SecurityKeyBundle};
pub use events::{EventHub, NodeSubscription};
pub use manager::{SessionHandle, SessionManager, SessionOptions, SessionState};
