//! Core constants for the lock controller.
//!
//! This module centralizes the numeric bounds and default timings used
//! throughout the workspace. The bounds come from the Z-Wave addressing
//! scheme and the user-code capabilities of the target lock hardware; the
//! timings reflect the fact that the underlying protocol gives no completion
//! acknowledgment for non-volatile writes and no bounded readiness signal
//! for the serial driver.
//!
//! # Usage
//!
//! ```
//! use latchkey_core::constants::*;
//! use std::time::Duration;
//!
//! fn valid_slot(slot: u8) -> bool {
//!     (MIN_CODE_SLOT..=MAX_CODE_SLOT).contains(&slot)
//! }
//!
//! let settle = Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS);
//! ```

/// Lowest valid node identifier on a Z-Wave network.
pub const MIN_NODE_ID: u8 = 1;

/// Highest valid node identifier on a Z-Wave network (232 per the
/// addressing scheme; node 255 is the broadcast address and never a target).
pub const MAX_NODE_ID: u8 = 232;

/// Lowest user-code slot number on a lock.
pub const MIN_CODE_SLOT: u8 = 1;

/// Highest user-code slot number supported by this controller.
///
/// The primary target lock exposes 30 slots. Devices reporting a smaller
/// count are bounded by their own report at enumeration time.
pub const MAX_CODE_SLOT: u8 = 30;

/// Enumeration ceiling used when a device does not report its slot count.
pub const DEFAULT_SLOT_CEILING: u8 = MAX_CODE_SLOT;

/// Minimum PIN length in digits.
pub const MIN_PIN_LENGTH: usize = 4;

/// Maximum PIN length in digits.
pub const MAX_PIN_LENGTH: usize = 8;

/// Default bound for waiting on driver readiness, in seconds.
///
/// `acquire()` fails with `ReadyTimeout` after this long; a reconnect
/// attempt stays scheduled in the background.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 60;

/// Fixed delay before a reconnect attempt, in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

/// Settle delay after a user-code write, in seconds.
///
/// The lock commits user codes to non-volatile storage without emitting a
/// completion event, so the workflow waits this long before the verification
/// read.
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 5;

/// Default bound for waiting on interview completion, in seconds.
///
/// Expiry resolves to an "incomplete" status rather than an error; the
/// device may still finish the interview after the caller stops waiting.
pub const DEFAULT_INTERVIEW_TIMEOUT_SECS: u64 = 60;

/// Length of one network security key in raw bytes.
pub const NETWORK_KEY_BYTES: usize = 16;

/// Length of one network security key in hex digits.
pub const NETWORK_KEY_HEX_DIGITS: usize = NETWORK_KEY_BYTES * 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_bounds_within_node_space() {
        assert!(MIN_CODE_SLOT >= MIN_NODE_ID);
        assert!(MAX_CODE_SLOT <= MAX_NODE_ID);
        assert_eq!(DEFAULT_SLOT_CEILING, MAX_CODE_SLOT);
    }

    #[test]
    fn test_pin_length_bounds() {
        assert!(MIN_PIN_LENGTH < MAX_PIN_LENGTH);
        assert_eq!(MIN_PIN_LENGTH, 4);
        assert_eq!(MAX_PIN_LENGTH, 8);
    }

    #[test]
    fn test_network_key_hex_digits() {
        assert_eq!(NETWORK_KEY_HEX_DIGITS, 32);
    }
}
