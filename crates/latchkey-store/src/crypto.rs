//! Store key handling and PIN blob encryption.

use crate::error::{Result, StoreError};
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use latchkey_core::PinCode;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;
use zeroize::Zeroizing;

/// Raw key length in bytes.
const KEY_BYTES: usize = 32;

/// Key length in hex digits as stored in the key file.
const KEY_HEX_DIGITS: usize = KEY_BYTES * 2;

/// XChaCha20-Poly1305 nonce length in bytes.
const NONCE_BYTES: usize = 24;

/// Symmetric key for the code store.
///
/// Wraps the raw bytes in [`Zeroizing`] so the material is wiped when the
/// key is dropped.
pub struct StoreKey {
    bytes: Zeroizing<[u8; KEY_BYTES]>,
}

impl StoreKey {
    /// Build a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_BYTES]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Parse a key from its hex representation (64 hex digits, surrounding
    /// whitespace ignored).
    pub fn from_hex(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.len() != KEY_HEX_DIGITS {
            return Err(StoreError::invalid_key(format!(
                "expected {KEY_HEX_DIGITS} hex digits, got {}",
                trimmed.len()
            )));
        }
        let decoded = hex::decode(trimmed)
            .map_err(|e| StoreError::invalid_key(format!("hex decode failed: {e}")))?;
        let mut bytes = [0u8; KEY_BYTES];
        bytes.copy_from_slice(&decoded);
        Ok(Self::from_bytes(bytes))
    }

    /// Load the key from `path`, or generate one and persist it when the
    /// file does not exist.
    ///
    /// Generation is logged loudly: the key file must be backed up
    /// externally. There is no key escrow; once PINs are stored, losing
    /// this key makes them permanently unrecoverable.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_hex(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let key = Self::generate();
                write_key_file(path, &key)?;
                warn!(
                    path = %path.display(),
                    "generated a new code store key; back this file up, \
                     stored PINs are unrecoverable without it"
                );
                Ok(key)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Hex representation of the key, for persisting to the key file.
    #[must_use]
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.bytes.as_slice()))
    }

    /// Encrypt a PIN into a self-contained blob.
    ///
    /// Every call draws a fresh random nonce; the result is
    /// base64(nonce || ciphertext+tag), decryptable given only the key.
    pub fn encrypt(&self, pin: &PinCode) -> Result<String> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.bytes.as_slice()));

        let mut nonce_bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, pin.as_str().as_bytes())
            .map_err(|_| StoreError::crypto("encryption failed"))?;

        let mut blob = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Fails on any tampering (the authentication tag covers the whole
    /// payload); never returns wrong plaintext silently.
    pub fn decrypt(&self, blob: &str) -> Result<PinCode> {
        let raw = BASE64
            .decode(blob)
            .map_err(|e| StoreError::crypto(format!("blob is not valid base64: {e}")))?;

        if raw.len() <= NONCE_BYTES {
            return Err(StoreError::crypto("blob too short to hold a nonce"));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_BYTES);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.bytes.as_slice()));
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
                .map_err(|_| StoreError::crypto("authentication failed"))?,
        );

        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| StoreError::crypto("decrypted payload is not UTF-8"))?;
        Ok(PinCode::new(text)?)
    }
}

impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreKey(<{KEY_BYTES} bytes>)")
    }
}

/// Write the key file atomically with restrictive permissions.
fn write_key_file(path: &Path, key: &StoreKey) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.as_file_mut().write_all(key.to_hex().as_bytes())?;
    temp.as_file_mut().write_all(b"\n")?;
    temp.as_file_mut().flush()?;
    fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o600))?;
    temp.persist(path)
        .map_err(|err| StoreError::Io(err.error))?;
    Ok(())
}
