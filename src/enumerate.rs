//! Value and subkey enumeration.
//!
//! Enumeration hands each item to a callback as a borrowed snapshot whose
//! name and data point into buffers reused for the next item; the lifetime
//! keeps callers from holding on to them. The collecting helpers copy out.

use crate::access::KeyAccess;
use crate::backend::{RegistryKey, RegistryRoot};
use crate::error::{RegistryError, Result, ERROR_MORE_DATA};
use crate::registry::RegistryAccess;
use crate::utils::names_equal;
use crate::value::{Charset, ValueData};
use crate::value_type::ValueType;
use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument, trace, warn};

/// One value seen during [`RegistryAccess::enum_all_values`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValueData<'a> {
    /// Enumeration index.
    pub index: u32,
    /// Value name; empty for the default value.
    pub name: &'a str,
    /// Stored type tag.
    pub value_type: ValueType,
    /// Payload bytes, wide text for string types.
    pub data: &'a [u8],
}

impl EnumValueData<'_> {
    /// Decodes the payload into its native shape.
    pub fn decode(&self) -> Result<ValueData> {
        ValueData::decode(self.value_type, self.data, Charset::Wide)
    }
}

/// One subkey seen during [`RegistryAccess::enum_all_subkeys`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumSubkeyData<'a> {
    /// Enumeration index.
    pub index: u32,
    /// Subkey name.
    pub name: &'a str,
    /// Class string, usually empty.
    pub class: &'a str,
    /// Last write time of the subkey.
    pub last_write_time: Option<DateTime<Utc>>,
}

/// An owned copy of one value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValueMapEntry {
    /// Value name as stored.
    pub name: String,
    /// Stored type tag.
    pub value_type: ValueType,
    /// Decoded value.
    pub value: ValueData,
}

impl ValueMapEntry {
    /// Copies an enumerated value.
    ///
    /// A supported type whose payload does not decode is kept as
    /// [`ValueData::Unhandled`] so one damaged value does not hide the rest.
    pub fn from_enum_data(item: &EnumValueData<'_>) -> Self {
        let value = item.decode().unwrap_or_else(|e| {
            warn!(name = item.name, error = %e, "Keeping undecodable value as raw bytes");
            ValueData::Unhandled {
                value_type: item.value_type,
                data: item.data.to_vec(),
            }
        });
        Self {
            name: item.name.to_string(),
            value_type: item.value_type,
            value,
        }
    }
}

impl<R: RegistryRoot> RegistryAccess<R> {
    /// Calls `on_value` for every value of `key`, in the order the registry
    /// enumerates them.
    ///
    /// An error from the callback stops the enumeration and is returned as
    /// is. A value that grows past the sizes reported when enumeration
    /// started fails with `ERROR_MORE_DATA`.
    #[instrument(skip(self, on_value))]
    pub fn enum_all_values<F>(&self, key: &str, mut on_value: F) -> Result<()>
    where
        F: FnMut(&EnumValueData<'_>) -> Result<()>,
    {
        let handle = self.open_key(key, KeyAccess::READ)?;
        let info = handle.query_info()?;
        debug!(
            values = info.value_count,
            max_name = info.max_value_name_len,
            max_data = info.max_value_data_len,
            "Enumerating values"
        );

        let mut name = String::with_capacity(info.max_value_name_len as usize + 1);
        let mut data = vec![0u8; info.max_value_data_len as usize];
        let mut index = 0u32;
        while let Some(outcome) = handle.enum_value(index, &mut name, &mut data)? {
            trace!(index, name = %name, value_type = %outcome.value_type, "Value");
            let payload = data
                .get(..outcome.data_len)
                .ok_or_else(|| RegistryError::os(ERROR_MORE_DATA))?;
            on_value(&EnumValueData {
                index,
                name: &name,
                value_type: outcome.value_type,
                data: payload,
            })?;
            index += 1;
        }
        Ok(())
    }

    /// Calls `on_subkey` for every direct subkey of `key`.
    #[instrument(skip(self, on_subkey))]
    pub fn enum_all_subkeys<F>(&self, key: &str, mut on_subkey: F) -> Result<()>
    where
        F: FnMut(&EnumSubkeyData<'_>) -> Result<()>,
    {
        let handle = self.open_key(key, KeyAccess::READ)?;
        let info = handle.query_info()?;
        debug!(subkeys = info.subkey_count, "Enumerating subkeys");

        let mut name = String::with_capacity(info.max_subkey_name_len as usize + 1);
        let mut class = String::with_capacity(info.max_class_len as usize + 1);
        let mut index = 0u32;
        while let Some(outcome) = handle.enum_key(index, &mut name, &mut class)? {
            trace!(index, name = %name, "Subkey");
            on_subkey(&EnumSubkeyData {
                index,
                name: &name,
                class: &class,
                last_write_time: outcome.last_write_time,
            })?;
            index += 1;
        }
        Ok(())
    }

    /// Copies every value of `key` into a map keyed by value name.
    pub fn read_all_values_into_map(&self, key: &str) -> Result<HashMap<String, ValueMapEntry>> {
        let mut map = HashMap::new();
        self.enum_all_values(key, |item| {
            map.insert(item.name.to_string(), ValueMapEntry::from_enum_data(item));
            Ok(())
        })?;
        Ok(map)
    }

    /// Collects the names of the direct subkeys of `key`.
    pub fn read_all_subkeys_into_vec(&self, key: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.enum_all_subkeys(key, |item| {
            names.push(item.name.to_string());
            Ok(())
        })?;
        Ok(names)
    }

    /// Reads one value by scanning the whole key instead of querying it by
    /// name, so the name never appears in a registry call.
    ///
    /// Names compare case-insensitively. A missing value is
    /// [`RegistryError::NotFound`].
    pub fn read_value_obfuscated(&self, key: &str, name: &str) -> Result<ValueMapEntry> {
        let mut found = None;
        self.enum_all_values(key, |item| {
            if found.is_none() && names_equal(item.name, name) {
                found = Some(ValueMapEntry::from_enum_data(item));
            }
            Ok(())
        })?;
        found.ok_or_else(|| RegistryError::not_found("value", name))
    }

    /// Reads several values in one scan, see
    /// [`read_value_obfuscated`](Self::read_value_obfuscated).
    ///
    /// Entries come back in the order requested; names that do not exist are
    /// left out.
    pub fn read_values_obfuscated<S: AsRef<str>>(
        &self,
        key: &str,
        names: &[S],
    ) -> Result<Vec<ValueMapEntry>> {
        let mut found: Vec<Option<ValueMapEntry>> = vec![None; names.len()];
        self.enum_all_values(key, |item| {
            for (slot, wanted) in found.iter_mut().zip(names) {
                if slot.is_none() && names_equal(item.name, wanted.as_ref()) {
                    *slot = Some(ValueMapEntry::from_enum_data(item));
                }
            }
            Ok(())
        })?;
        Ok(found.into_iter().flatten().collect())
    }
}
