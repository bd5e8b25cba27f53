//! The registry accessor.
//!
//! A [`RegistryAccess`] is bound to one root (a predefined hive or an
//! in-memory tree) and addresses everything below it by key path. It holds no
//! open handles: every operation opens the key it needs and closes it before
//! returning.

use crate::access::{KeyAccess, Wow64KeyAccess};
use crate::backend::{Disposition, QueryOutcome, RegistryKey, RegistryRoot};
use crate::config::{AccessConfig, DeleteOptions};
use crate::error::{RegistryError, Result};
use crate::utils::split_registry_path;
use crate::value::{
    decode_binary, decode_dword, decode_multi_string, decode_qword, decode_string, encode_binary,
    encode_dword, encode_multi_string, encode_qword, encode_string, Charset, RawValue, ValueData,
};
use crate::value_type::ValueType;
use tracing::{debug, instrument, warn};

/// Substitutes `default` when the key or value does not exist.
fn or_default<T>(result: Result<T>, default: T) -> Result<T> {
    match result {
        Err(e) if e.is_not_found() => Ok(default),
        other => other,
    }
}

fn require_key_path(key: &str) -> Result<()> {
    if split_registry_path(key).next().is_none() {
        return Err(RegistryError::InvalidPath(key.to_string()));
    }
    Ok(())
}

/// Typed, scoped access to the keys below one registry root.
///
/// # Examples
///
/// ```rust
/// use reg_access::{MemoryRegistry, RegistryAccess};
///
/// let reg = RegistryAccess::new(MemoryRegistry::new());
/// reg.ensure_key_exists("SOFTWARE\\Vendor\\App")?;
/// reg.write_dword("SOFTWARE\\Vendor\\App", "Retries", 3)?;
/// assert_eq!(reg.read_dword("SOFTWARE\\Vendor\\App", "Retries")?, 3);
/// assert_eq!(reg.read_dword_or("SOFTWARE\\Vendor\\App", "Missing", 7)?, 7);
/// # Ok::<(), reg_access::RegistryError>(())
/// ```
#[derive(Debug, Clone)]
pub struct RegistryAccess<R: RegistryRoot> {
    root: R,
    config: AccessConfig,
}

impl<R: RegistryRoot> RegistryAccess<R> {
    /// Creates an accessor with the default configuration.
    pub fn new(root: R) -> Self {
        Self::with_config(root, AccessConfig::default())
    }

    /// Creates an accessor with the given configuration.
    pub fn with_config(root: R, config: AccessConfig) -> Self {
        Self { root, config }
    }

    /// Selects the registry view used by subsequent operations.
    pub fn set_wow64_key_access(&mut self, policy: Wow64KeyAccess) {
        self.config.wow64 = policy;
    }

    /// Current configuration.
    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// The root this accessor is bound to.
    pub fn root(&self) -> &R {
        &self.root
    }

    fn view(&self) -> KeyAccess {
        self.config.wow64.access_flags()
    }

    /// Opens `key` with `access` plus the configured view bits.
    ///
    /// The handle closes when dropped.
    pub fn open_key(&self, key: &str, access: KeyAccess) -> Result<R::Key> {
        self.root.open_key(key, access | self.view())
    }

    /// Returns the stored type and payload size of a value without reading
    /// it.
    #[instrument(skip(self))]
    pub fn read_value_info(&self, key: &str, name: &str) -> Result<(ValueType, usize)> {
        let handle = self.open_key(key, KeyAccess::QUERY_VALUE)?;
        match handle.query_value(name, Charset::Wide, &mut [])? {
            QueryOutcome::Complete { value_type, len } => Ok((value_type, len)),
            QueryOutcome::MoreData { value_type, required } => Ok((value_type, required)),
        }
    }

    /// Reads a value's type and payload through the wide API.
    pub fn read_value_base(&self, key: &str, name: &str) -> Result<RawValue> {
        self.read_value_base_with(key, name, Charset::Wide)
    }

    /// Reads a value's type and payload through the API of `charset`.
    ///
    /// The first query uses a buffer of `initial_buffer_size` bytes. If the
    /// value is larger the buffer grows to the reported size and the query
    /// is repeated, up to `max_read_attempts` calls in total.
    ///
    /// # Errors
    ///
    /// [`RegistryError::RetriesExhausted`] if the value kept growing between
    /// calls; partial data is never returned.
    #[instrument(skip(self))]
    pub fn read_value_base_with(
        &self,
        key: &str,
        name: &str,
        charset: Charset,
    ) -> Result<RawValue> {
        let handle = self.open_key(key, KeyAccess::QUERY_VALUE)?;
        self.query_whole_value(&handle, name, charset)
    }

    fn query_whole_value(&self, handle: &R::Key, name: &str, charset: Charset) -> Result<RawValue> {
        let mut buf = vec![0u8; self.config.initial_buffer_size];
        for attempt in 1..=self.config.max_read_attempts {
            match handle.query_value(name, charset, &mut buf)? {
                QueryOutcome::Complete { value_type, len } => {
                    buf.truncate(len);
                    return Ok(RawValue::new(value_type, buf));
                }
                QueryOutcome::MoreData { required, .. } => {
                    debug!(attempt, required, "Value larger than buffer, growing");
                    buf.resize(required, 0);
                }
            }
        }

        warn!(attempts = self.config.max_read_attempts, "Value read did not settle");
        Err(RegistryError::RetriesExhausted {
            attempts: self.config.max_read_attempts,
        })
    }

    /// Writes a value through the wide API. The key must exist.
    pub fn write_value_base(
        &self,
        key: &str,
        name: &str,
        value_type: ValueType,
        data: &[u8],
    ) -> Result<()> {
        self.write_value_base_with(key, name, value_type, data, Charset::Wide)
    }

    /// Writes a value through the API of `charset`. The key must exist.
    #[instrument(skip(self, data), fields(len = data.len()))]
    pub fn write_value_base_with(
        &self,
        key: &str,
        name: &str,
        value_type: ValueType,
        data: &[u8],
        charset: Charset,
    ) -> Result<()> {
        require_key_path(key)?;
        let handle = self.open_key(key, KeyAccess::SET_VALUE)?;
        handle.set_value(name, charset, value_type, data)
    }

    fn write_raw(&self, key: &str, name: &str, raw: &RawValue, charset: Charset) -> Result<()> {
        self.write_value_base_with(key, name, raw.value_type, &raw.data, charset)
    }

    /// Reads a `REG_SZ` or `REG_EXPAND_SZ` value. Environment references are
    /// not expanded.
    pub fn read_string(&self, key: &str, name: &str) -> Result<String> {
        let raw = self.read_value_base_with(key, name, Charset::Wide)?;
        decode_string(raw.value_type, &raw.data, Charset::Wide)
    }

    /// [`read_string`](Self::read_string), or `default` if absent.
    pub fn read_string_or(&self, key: &str, name: &str, default: &str) -> Result<String> {
        or_default(self.read_string(key, name), default.to_string())
    }

    /// Writes a `REG_SZ` value.
    pub fn write_string(&self, key: &str, name: &str, value: &str) -> Result<()> {
        self.write_raw(key, name, &encode_string(value, Charset::Wide)?, Charset::Wide)
    }

    /// Reads a string value through the narrow API.
    pub fn read_string_narrow(&self, key: &str, name: &str) -> Result<String> {
        let raw = self.read_value_base_with(key, name, Charset::Narrow)?;
        decode_string(raw.value_type, &raw.data, Charset::Narrow)
    }

    /// [`read_string_narrow`](Self::read_string_narrow), or `default` if
    /// absent.
    pub fn read_string_narrow_or(&self, key: &str, name: &str, default: &str) -> Result<String> {
        or_default(self.read_string_narrow(key, name), default.to_string())
    }

    /// Writes a `REG_SZ` value through the narrow API.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidString`] if `value` has characters outside
    /// the narrow code page.
    pub fn write_string_narrow(&self, key: &str, name: &str, value: &str) -> Result<()> {
        self.write_raw(key, name, &encode_string(value, Charset::Narrow)?, Charset::Narrow)
    }

    /// Reads a `REG_DWORD` value.
    pub fn read_dword(&self, key: &str, name: &str) -> Result<u32> {
        let raw = self.read_value_base(key, name)?;
        decode_dword(raw.value_type, &raw.data)
    }

    /// [`read_dword`](Self::read_dword), or `default` if absent.
    pub fn read_dword_or(&self, key: &str, name: &str, default: u32) -> Result<u32> {
        or_default(self.read_dword(key, name), default)
    }

    /// Writes a `REG_DWORD` value.
    pub fn write_dword(&self, key: &str, name: &str, value: u32) -> Result<()> {
        self.write_raw(key, name, &encode_dword(value), Charset::Wide)
    }

    /// Reads a `REG_QWORD` value.
    pub fn read_qword(&self, key: &str, name: &str) -> Result<u64> {
        let raw = self.read_value_base(key, name)?;
        decode_qword(raw.value_type, &raw.data)
    }

    /// [`read_qword`](Self::read_qword), or `default` if absent.
    pub fn read_qword_or(&self, key: &str, name: &str, default: u64) -> Result<u64> {
        or_default(self.read_qword(key, name), default)
    }

    /// Writes a `REG_QWORD` value.
    pub fn write_qword(&self, key: &str, name: &str, value: u64) -> Result<()> {
        self.write_raw(key, name, &encode_qword(value), Charset::Wide)
    }

    /// Reads a `REG_MULTI_SZ` value.
    pub fn read_multi_string(&self, key: &str, name: &str) -> Result<Vec<String>> {
        let raw = self.read_value_base(key, name)?;
        decode_multi_string(raw.value_type, &raw.data, Charset::Wide)
    }

    /// [`read_multi_string`](Self::read_multi_string), or `default` if
    /// absent.
    pub fn read_multi_string_or(
        &self,
        key: &str,
        name: &str,
        default: Vec<String>,
    ) -> Result<Vec<String>> {
        or_default(self.read_multi_string(key, name), default)
    }

    /// Writes a `REG_MULTI_SZ` value.
    pub fn write_multi_string<S: AsRef<str>>(
        &self,
        key: &str,
        name: &str,
        values: &[S],
    ) -> Result<()> {
        self.write_raw(key, name, &encode_multi_string(values, Charset::Wide)?, Charset::Wide)
    }

    /// Reads a `REG_BINARY` value.
    pub fn read_binary(&self, key: &str, name: &str) -> Result<Vec<u8>> {
        let raw = self.read_value_base(key, name)?;
        decode_binary(raw.value_type, &raw.data)
    }

    /// [`read_binary`](Self::read_binary), or `default` if absent.
    pub fn read_binary_or(&self, key: &str, name: &str, default: Vec<u8>) -> Result<Vec<u8>> {
        or_default(self.read_binary(key, name), default)
    }

    /// Writes a `REG_BINARY` value.
    pub fn write_binary(&self, key: &str, name: &str, data: &[u8]) -> Result<()> {
        self.write_raw(key, name, &encode_binary(data), Charset::Wide)
    }

    /// Reads a value of any type into the matching [`ValueData`] shape.
    pub fn read_value(&self, key: &str, name: &str) -> Result<ValueData> {
        let raw = self.read_value_base(key, name)?;
        ValueData::from_raw(&raw, Charset::Wide)
    }

    /// [`read_value`](Self::read_value), or `default` if absent.
    pub fn read_value_or(&self, key: &str, name: &str, default: ValueData) -> Result<ValueData> {
        or_default(self.read_value(key, name), default)
    }

    /// Writes a value in the representation its shape maps to.
    pub fn write_value(&self, key: &str, name: &str, value: &ValueData) -> Result<()> {
        self.write_raw(key, name, &value.encode(Charset::Wide)?, Charset::Wide)
    }

    /// Returns true if `key` can be opened for reading.
    ///
    /// Absence, missing rights and any other open failure all read as
    /// "does not exist".
    #[instrument(skip(self))]
    pub fn check_key_exists(&self, key: &str) -> bool {
        match self.open_key(key, KeyAccess::READ) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Key not accessible");
                false
            }
        }
    }

    /// Alias of [`check_key_exists`](Self::check_key_exists).
    pub fn does_key_exist(&self, key: &str) -> bool {
        self.check_key_exists(key)
    }

    /// Creates `key` and any missing parents, or opens it if present.
    #[instrument(skip(self))]
    pub fn ensure_key_exists(&self, key: &str) -> Result<()> {
        require_key_path(key)?;
        let (_handle, disposition) = self
            .root
            .create_key(key, KeyAccess::ALL_ACCESS | self.view())?;
        match disposition {
            Disposition::CreatedNew | Disposition::OpenedExisting => {
                debug!(?disposition, "Key present");
                Ok(())
            }
            Disposition::Other(raw) => Err(RegistryError::UnexpectedDisposition(raw)),
        }
    }

    fn check_safe_delete(&self, key: &str, options: &DeleteOptions) -> Result<()> {
        if !options.permits(key) {
            warn!(key, "Delete refused by safe-delete guard");
            return Err(RegistryError::SafeDeleteRefused { path: key.to_string() });
        }
        Ok(())
    }

    /// Deletes `key`, which must have no subkeys.
    ///
    /// The safe-delete guard in `options` is checked before the registry is
    /// touched.
    #[instrument(skip(self, options))]
    pub fn delete_key(&self, key: &str, options: &DeleteOptions) -> Result<()> {
        self.check_safe_delete(key, options)?;
        require_key_path(key)?;
        self.root.delete_key(key, self.view())
    }

    /// Deletes one value of `key`, subject to the same guard as
    /// [`delete_key`](Self::delete_key).
    #[instrument(skip(self, options))]
    pub fn delete_value(&self, key: &str, name: &str, options: &DeleteOptions) -> Result<()> {
        self.check_safe_delete(key, options)?;
        let handle = self.open_key(key, KeyAccess::SET_VALUE)?;
        handle.delete_value(name)
    }
}
