//! Shared types, constants, and error taxonomy for the latchkey lock
//! controller.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//! validated identifiers ([`NodeId`], [`CodeSlot`]), the PIN newtype with
//! constant-time comparison ([`PinCode`]), the outcome and trace types
//! returned by the verified set-code workflow, and the error kinds that
//! presentation adapters translate into exit codes or HTTP statuses.
//!
//! [`NodeId`]: types::NodeId
//! [`CodeSlot`]: types::CodeSlot
//! [`PinCode`]: types::PinCode

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
