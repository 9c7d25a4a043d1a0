//! Protocol-driver boundary for the latchkey lock controller.
//!
//! The actual Z-Wave stack (radio framing, command-class encoding, security
//! handshakes) lives in an external driver. This crate defines the trait
//! surface the rest of the workspace calls ([`LockDriver`]), the event type
//! the driver reports ([`DriverEvent`]), and a scriptable mock for
//! development and testing without a radio attached.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All driver calls are asynchronous using native
//!   `async fn` in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Enum dispatch**: RPITIT traits are not object-safe, so backend
//!   selection goes through [`AnyLockDriver`] rather than `Box<dyn _>`.
//! - **No retry policy**: The driver reports what the transport did; retry,
//!   reconnection, and verification policies live in the session and
//!   commands crates.
//!
//! # Example
//!
//! ```
//! use latchkey_driver::mock::MockDriver;
//! use latchkey_driver::traits::LockDriver;
//! use latchkey_core::{DoorMode, NodeId};
//!
//! #[tokio::main]
//! async fn main() -> latchkey_driver::Result<()> {
//!     let (mut driver, handle) = MockDriver::new();
//!     let node = NodeId::new(8).unwrap();
//!     handle.add_node(node);
//!
//!     driver.connect().await?;
//!     driver.door_lock_set(node, DoorMode::Secured).await?;
//!     assert_eq!(driver.door_lock_get(node).await?, DoorMode::Secured);
//!     Ok(())
//! }
//! ```

pub mod drivers;
pub mod error;
pub mod mock;
pub mod traits;

pub use drivers::AnyLockDriver;
pub use error::{DriverError, Result};
pub use traits::{
    DriverEvent, InterviewStatus, LockDriver, NodeSummary, NotificationKind, SecurityClass,
};
