//! Controller configuration: serial target and Z-Wave security keys.
//!
//! The configuration is a small JSON file holding the serial port the
//! external driver should open and the network security key bundle granted
//! at inclusion time. Keys are generated once and then never touched again:
//! regenerating a key silently unpairs every device that was included with
//! it, so [`ControllerConfig::load_or_init`] only fills in keys that are
//! missing and persists the result atomically.

use latchkey_core::{
    Error, Result,
    constants::{NETWORK_KEY_BYTES, NETWORK_KEY_HEX_DIGITS},
};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// The four network keys a Z-Wave controller holds, one per security class.
///
/// Each key is 16 bytes, hex encoded (32 digits). `Debug` redacts the key
/// material.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SecurityKeyBundle {
    pub s2_access_control: Option<String>,
    pub s2_authenticated: Option<String>,
    pub s2_unauthenticated: Option<String>,
    pub s0_legacy: Option<String>,
}

impl SecurityKeyBundle {
    /// Generate any missing keys in place.
    ///
    /// Returns the names of the keys that were generated. Present keys are
    /// never replaced.
    pub fn fill_missing(&mut self) -> Vec<&'static str> {
        let mut generated = Vec::new();
        for (name, key) in [
            ("s2_access_control", &mut self.s2_access_control),
            ("s2_authenticated", &mut self.s2_authenticated),
            ("s2_unauthenticated", &mut self.s2_unauthenticated),
            ("s0_legacy", &mut self.s0_legacy),
        ] {
            if key.is_none() {
                *key = Some(generate_network_key());
                generated.push(name);
            }
        }
        generated
    }

    /// Validate that every present key is exactly 32 hex digits.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        for (name, key) in [
            ("s2_access_control", &self.s2_access_control),
            ("s2_authenticated", &self.s2_authenticated),
            ("s2_unauthenticated", &self.s2_unauthenticated),
            ("s0_legacy", &self.s0_legacy),
        ] {
            if let Some(key) = key {
                if key.len() != NETWORK_KEY_HEX_DIGITS
                    || !key.bytes().all(|b| b.is_ascii_hexdigit())
                {
                    return Err(Error::config(format!(
                        "security key {name} must be {NETWORK_KEY_HEX_DIGITS} hex digits"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether every key is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.s2_access_control.is_some()
            && self.s2_authenticated.is_some()
            && self.s2_unauthenticated.is_some()
            && self.s0_legacy.is_some()
    }
}

impl fmt::Debug for SecurityKeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn tag(key: &Option<String>) -> &'static str {
            if key.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("SecurityKeyBundle")
            .field("s2_access_control", &tag(&self.s2_access_control))
            .field("s2_authenticated", &tag(&self.s2_authenticated))
            .field("s2_unauthenticated", &tag(&self.s2_unauthenticated))
            .field("s0_legacy", &tag(&self.s0_legacy))
            .finish()
    }
}

fn generate_network_key() -> String {
    let mut bytes = [0u8; NETWORK_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Controller configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Serial port of the Z-Wave adapter, e.g. `/dev/ttyUSB0`.
    ///
    /// Absence is a fatal configuration error at session start; the session
    /// surfaces it to the caller and never retries.
    pub serial_port: Option<String>,

    /// Network security key bundle.
    #[serde(default)]
    pub keys: SecurityKeyBundle,
}

impl ControllerConfig {
    /// Load the config from `path`, creating it when absent.
    ///
    /// Missing security keys are generated exactly once and persisted; keys
    /// already on disk are never regenerated. A loud warning is logged for
    /// every generated key since the key material is the only way to talk to
    /// already-included devices.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for malformed JSON or invalid keys, `Error::Io`
    /// for filesystem failures.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str::<Self>(&contents)
                .map_err(|e| Error::config(format!("bad config file: {e}")))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err.into()),
        };
        config.keys.validate()?;

        let generated = config.keys.fill_missing();
        if !generated.is_empty() {
            warn!(
                keys = ?generated,
                path = %path.display(),
                "generated new network security keys; back up the config file, \
                 regenerating these keys unpairs every included device"
            );
            config.write_to(path)?;
        }

        debug!(path = %path.display(), serial_port = ?config.serial_port, "loaded controller config");
        Ok(config)
    }

    /// The configured serial port.
    ///
    /// # Errors
    /// Returns a fatal `Error::Config` when no port is configured.
    pub fn require_serial_port(&self) -> Result<&str> {
        self.serial_port
            .as_deref()
            .ok_or_else(|| Error::config("no serial_port configured"))
    }

    /// Persist the config atomically with owner-only permissions.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let json = serde_json::to_vec_pretty(self).map_err(|e| Error::config(e.to_string()))?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.as_file_mut().write_all(&json)?;
        temp.as_file_mut().flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            temp.as_file().set_permissions(perms)?;
        }

        temp.persist(path).map_err(|err| Error::Io(err.error))?;
        Ok(())
    }
}
