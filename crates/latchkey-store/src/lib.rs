//! Encrypted-at-rest code store for the latchkey lock controller.
//!
//! Persists the slot → label mapping with the PIN encrypted per record.
//! The store is a local cache of *intent*, independent of the lock
//! connection: it never contacts the device, and its contents can diverge
//! from what the lock actually holds (which is why the set-code workflow
//! treats duplicate hints from the store as soft).
//!
//! # Encryption strategy
//!
//! PINs are stored as XChaCha20-Poly1305 ciphertext, base64-encoded. Each
//! encryption uses a fresh random 24-byte nonce; the blob embeds
//! nonce ‖ ciphertext+tag so decryption is self-contained given only the
//! key. The key is loaded from a key file at startup; if absent, one is
//! generated and written with restrictive permissions, with a loud warning
//! that it must be backed up: there is no key escrow, and losing the key
//! makes stored PINs permanently unrecoverable.

pub mod crypto;
pub mod error;
pub mod store;

pub use crypto::StoreKey;
pub use error::{Result, StoreError};
pub use store::{CodeListing, CodeStore, StoredCode};
