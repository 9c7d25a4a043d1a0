//! Mock driver implementation for testing and development.
//!
//! This module provides a simulated Z-Wave driver that can be scripted
//! programmatically, including the failure modes real locks exhibit:
//! silent rejection of user codes, sleepy nodes that time out on reads,
//! and transport failures mid-session.

pub mod driver;

pub use driver::{MockDriver, MockDriverHandle};
