//! # Windows Registry Access
//!
//! Typed, scoped access to the Windows registry: read and write values as
//! native Rust types, enumerate keys, and manage key lifetimes without ever
//! leaking a handle.
//!
//! ## Features
//!
//! - **Typed values**: strings, numbers, multi-strings and binary data with
//!   exact conversions; a wrong type tag is an error, never a coercion
//! - **Scoped handles**: every operation opens what it needs and closes it on
//!   every path out
//! - **Defaults**: every read has an `_or` variant that substitutes a
//!   default only when the key or value does not exist
//! - **Enumeration**: callback-based enumeration over borrowed snapshots, plus
//!   helpers that collect into owned maps and vectors
//! - **Safe deletes**: an optional path-prefix guard on key and value
//!   deletion
//! - **WOW64 views**: choose the 32-bit or 64-bit view per accessor
//! - **Portable testing**: an in-memory backend with the registry's
//!   observable semantics
//!
//! ## Architecture
//!
//! 1. **Backend** ([`backend`]): the [`RegistryRoot`] and [`RegistryKey`]
//!    traits, implemented by the Win32 API ([`native`], Windows only) and by
//!    [`MemoryRegistry`]
//! 2. **Conversions** ([`value`]): raw payloads to and from native values
//! 3. **Accessor** ([`RegistryAccess`]): key paths in, typed values out
//! 4. **Options** ([`options`]): registry keys as application option sources
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use reg_access::{DeleteOptions, MemoryRegistry, RegistryAccess};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reg = RegistryAccess::new(MemoryRegistry::new());
//! let key = "SOFTWARE\\Vendor\\App";
//!
//! reg.ensure_key_exists(key)?;
//! reg.write_string(key, "InstallDir", "C:\\Program Files\\App")?;
//! reg.write_multi_string(key, "Plugins", &["core", "net"])?;
//!
//! assert_eq!(reg.read_string(key, "InstallDir")?, "C:\\Program Files\\App");
//! assert_eq!(reg.read_dword_or(key, "Timeout", 30)?, 30);
//!
//! for name in reg.read_all_values_into_map(key)?.keys() {
//!     println!("value: {}", name);
//! }
//!
//! let guard = DeleteOptions::default().with_safe_delete_path("SOFTWARE\\Vendor\\");
//! reg.delete_key(key, &guard)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Native Registry
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use reg_access::{PredefinedKey, RegistryAccess, Wow64KeyAccess};
//!
//! let mut reg = RegistryAccess::new(PredefinedKey::LocalMachine);
//! reg.set_wow64_key_access(Wow64KeyAccess::Force64);
//! let dir = reg.read_string("SOFTWARE\\Microsoft\\Windows\\CurrentVersion", "ProgramFilesDir")?;
//! println!("{}", dir);
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod backend;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod memory;
#[cfg(windows)]
pub mod native;
pub mod options;
pub mod registry;
pub mod utils;
pub mod value;
pub mod value_type;

// Re-export main types for convenience
pub use access::{KeyAccess, Wow64KeyAccess};
pub use backend::{Disposition, KeyInfo, QueryOutcome, RegistryKey, RegistryRoot};
pub use config::{AccessConfig, DeleteOptions};
pub use enumerate::{EnumSubkeyData, EnumValueData, ValueMapEntry};
pub use error::{RegistryError, Result};
pub use memory::MemoryRegistry;
#[cfg(windows)]
pub use native::{NativeKey, PredefinedKey};
pub use options::{
    AppOptions, LoadOutcome, OptionSource, OptionValue, RegistryOptionSource, SpecifiedValue,
};
pub use registry::RegistryAccess;
pub use utils::{join_registry_path, make_registry_path};
pub use value::{Charset, RawValue, ValueData};
pub use value_type::ValueType;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
