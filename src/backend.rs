//! The seam between [`RegistryAccess`](crate::RegistryAccess) and an actual
//! registry.
//!
//! A [`RegistryRoot`] stands for a base handle (a predefined hive such as
//! `HKEY_CURRENT_USER`, or an in-memory tree). Opening a path under it yields
//! a [`RegistryKey`], an open handle that is closed when dropped. The methods
//! mirror the handful of OS calls the accessor needs, with the OS's own
//! buffer and status conventions.

use crate::access::KeyAccess;
use crate::error::Result;
use crate::value::Charset;
use crate::value_type::ValueType;
use chrono::{DateTime, Utc};

/// Result of querying a value into a caller-supplied buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The payload fit; `len` bytes of the buffer are valid.
    Complete {
        /// Stored type tag.
        value_type: ValueType,
        /// Payload length in bytes.
        len: usize,
    },
    /// The buffer was too small (`ERROR_MORE_DATA`); `required` is the size
    /// the OS reported at the time of the call.
    MoreData {
        /// Stored type tag.
        value_type: ValueType,
        /// Payload length in bytes.
        required: usize,
    },
}

/// Metadata of an open key (`RegQueryInfoKey`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// Number of subkeys.
    pub subkey_count: u32,
    /// Longest subkey name, in characters, without terminator.
    pub max_subkey_name_len: u32,
    /// Longest subkey class string, in characters, without terminator.
    pub max_class_len: u32,
    /// Number of values.
    pub value_count: u32,
    /// Longest value name, in characters, without terminator.
    pub max_value_name_len: u32,
    /// Largest value payload, in bytes.
    pub max_value_data_len: u32,
    /// Last time the key or one of its values was written.
    pub last_write_time: Option<DateTime<Utc>>,
}

/// One value returned by [`RegistryKey::enum_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValueOutcome {
    /// Stored type tag.
    pub value_type: ValueType,
    /// Bytes of the data buffer that are valid.
    pub data_len: usize,
}

/// One subkey returned by [`RegistryKey::enum_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumKeyOutcome {
    /// Last write time of the subkey.
    pub last_write_time: Option<DateTime<Utc>>,
}

/// How a create-or-open call resolved (`REG_CREATED_NEW_KEY` /
/// `REG_OPENED_EXISTING_KEY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The key did not exist and was created.
    CreatedNew,
    /// The key already existed.
    OpenedExisting,
    /// Anything else the OS reported.
    Other(u32),
}

impl Disposition {
    /// Maps the raw disposition value.
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Disposition::CreatedNew,
            2 => Disposition::OpenedExisting,
            other => Disposition::Other(other),
        }
    }
}

/// A base handle under which key paths are resolved.
pub trait RegistryRoot {
    /// Open key handle type. Dropping it closes the handle.
    type Key: RegistryKey;

    /// Opens an existing key.
    ///
    /// `access` includes any view-selection bits. A missing key is
    /// [`RegistryError::NotFound`](crate::RegistryError::NotFound).
    fn open_key(&self, path: &str, access: KeyAccess) -> Result<Self::Key>;

    /// Creates a key (and any missing parents) or opens it if it exists.
    fn create_key(&self, path: &str, access: KeyAccess) -> Result<(Self::Key, Disposition)>;

    /// Deletes a key that has no subkeys. Only the view bits of `access` are
    /// used.
    fn delete_key(&self, path: &str, access: KeyAccess) -> Result<()>;
}

/// An open registry key.
pub trait RegistryKey {
    /// Reads a value into `buf`. An empty `name` addresses the default value.
    ///
    /// A missing value is [`RegistryError::NotFound`](crate::RegistryError::NotFound);
    /// a buffer that is too small is [`QueryOutcome::MoreData`], not an error.
    fn query_value(&self, name: &str, charset: Charset, buf: &mut [u8]) -> Result<QueryOutcome>;

    /// Writes a value. `data` is the exact payload.
    fn set_value(
        &self,
        name: &str,
        charset: Charset,
        value_type: ValueType,
        data: &[u8],
    ) -> Result<()>;

    /// Deletes a value.
    fn delete_value(&self, name: &str) -> Result<()>;

    /// Reads counts and size maxima of the key.
    fn query_info(&self) -> Result<KeyInfo>;

    /// Reads the value at `index` into the supplied buffers. Text payloads
    /// are returned wide.
    ///
    /// `name` is cleared and filled with the value name. `data` must be large
    /// enough for the payload; a payload that grew past it is reported as
    /// `ERROR_MORE_DATA`. Returns `None` past the last value.
    fn enum_value(
        &self,
        index: u32,
        name: &mut String,
        data: &mut [u8],
    ) -> Result<Option<EnumValueOutcome>>;

    /// Reads the subkey at `index`; `name` and `class` are cleared and
    /// filled. Returns `None` past the last subkey.
    fn enum_key(
        &self,
        index: u32,
        name: &mut String,
        class: &mut String,
    ) -> Result<Option<EnumKeyOutcome>>;
}
