//! Accessor configuration.

use crate::access::Wow64KeyAccess;
use crate::utils::path_has_prefix;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default size of the first read buffer, in bytes.
pub const DEFAULT_INITIAL_BUFFER_SIZE: usize = 1024;

/// Default number of query calls a single value read may make.
pub const DEFAULT_MAX_READ_ATTEMPTS: usize = 2;

/// Settings carried by a [`RegistryAccess`](crate::RegistryAccess).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AccessConfig {
    /// Registry view added to every open and create call.
    pub wow64: Wow64KeyAccess,
    /// Query calls allowed per value read before giving up.
    pub max_read_attempts: usize,
    /// Size of the first read buffer.
    pub initial_buffer_size: usize,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            wow64: Wow64KeyAccess::Default,
            max_read_attempts: DEFAULT_MAX_READ_ATTEMPTS,
            initial_buffer_size: DEFAULT_INITIAL_BUFFER_SIZE,
        }
    }
}

impl AccessConfig {
    /// Returns a copy using the given registry view.
    pub fn with_wow64(mut self, wow64: Wow64KeyAccess) -> Self {
        self.wow64 = wow64;
        self
    }
}

/// Guard applied by key and value deletion.
///
/// With `ensure_safe_delete` set, a delete only proceeds when the target key
/// path starts with one of `safe_delete_paths` (compared case-insensitively,
/// as raw text). An empty list then refuses everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeleteOptions {
    /// Whether the guard is active.
    pub ensure_safe_delete: bool,
    /// Allowed key path prefixes.
    pub safe_delete_paths: Vec<String>,
}

impl DeleteOptions {
    /// Options with the guard turned off.
    pub fn unguarded() -> Self {
        Self::default()
    }

    /// Turns the guard on and allows one more prefix.
    pub fn with_safe_delete_path(mut self, prefix: impl Into<String>) -> Self {
        self.ensure_safe_delete = true;
        self.safe_delete_paths.push(prefix.into());
        self
    }

    /// Returns true if `key_path` may be deleted under these options.
    pub fn permits(&self, key_path: &str) -> bool {
        !self.ensure_safe_delete
            || self
                .safe_delete_paths
                .iter()
                .any(|prefix| path_has_prefix(key_path, prefix))
    }
}
