//! Loading application options from a registry key.
//!
//! Options are collected into an [`AppOptions`] store owned by the caller.
//! [`RegistryOptionSource`] turns the values of one key into named entries
//! tagged with where they came from.

use crate::backend::RegistryRoot;
use crate::enumerate::ValueMapEntry;
use crate::error::Result;
use crate::registry::RegistryAccess;
use crate::utils::names_equal;
use crate::value::ValueData;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument, trace};

/// Where an option value was specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OptionSource {
    /// The system configuration store (the registry).
    SystemConfigRepository,
    /// Set by the application itself.
    Application,
}

impl fmt::Display for OptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptionSource::SystemConfigRepository => "system config repository",
            OptionSource::Application => "application",
        })
    }
}

/// The value of one option.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OptionValue {
    /// Text.
    String(String),
    /// 32-bit number.
    U32(u32),
    /// 64-bit number.
    U64(u64),
}

impl OptionValue {
    /// Picks the option shape for a registry value.
    ///
    /// Strings win over 32-bit numbers, which win over 64-bit numbers.
    /// Multi-strings, binary data and unsupported types have no option form.
    pub fn from_value_data(value: &ValueData) -> Option<Self> {
        match value {
            ValueData::String(s) | ValueData::ExpandString(s) => {
                Some(OptionValue::String(s.clone()))
            }
            ValueData::Dword(d) => Some(OptionValue::U32(*d)),
            ValueData::Qword(q) => Some(OptionValue::U64(*q)),
            ValueData::MultiString(_) | ValueData::Binary(_) | ValueData::Unhandled { .. } => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::String(s) => f.write_str(s),
            OptionValue::U32(v) => write!(f, "{}", v),
            OptionValue::U64(v) => write!(f, "{}", v),
        }
    }
}

/// A named option value and its source.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpecifiedValue {
    /// Where the value came from.
    pub source: OptionSource,
    /// Option name.
    pub name: String,
    /// Option value.
    pub value: OptionValue,
}

impl SpecifiedValue {
    /// Creates a specified value.
    pub fn new(source: OptionSource, name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            source,
            name: name.into(),
            value,
        }
    }
}

/// Caller-owned collection of specified option values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppOptions {
    values: Vec<SpecifiedValue>,
}

impl AppOptions {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value. Earlier values with the same name are kept but
    /// shadowed.
    pub fn add_specified_value(&mut self, value: SpecifiedValue) {
        self.values.push(value);
    }

    /// Finds the most recently added value with this name, ignoring case.
    pub fn find_specified_value_by_name(&self, name: &str) -> Option<&SpecifiedValue> {
        self.values.iter().rev().find(|v| names_equal(&v.name, name))
    }

    /// Number of values recorded.
    pub fn specified_values_count(&self) -> usize {
        self.values.len()
    }

    /// Values in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &SpecifiedValue> {
        self.values.iter()
    }
}

impl<'a> IntoIterator for &'a AppOptions {
    type Item = &'a SpecifiedValue;
    type IntoIter = std::slice::Iter<'a, SpecifiedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Outcome of loading options from a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The key existed; this many options were added.
    Loaded(usize),
    /// The key does not exist. Nothing was added.
    SourceMissing,
}

/// Loads options from registry keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptionSource {
    source: OptionSource,
}

impl Default for RegistryOptionSource {
    fn default() -> Self {
        Self {
            source: OptionSource::SystemConfigRepository,
        }
    }
}

impl RegistryOptionSource {
    /// A source tagging values as coming from the system config repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every value of `path` with an option form to `options`.
    ///
    /// Entries are added in case-insensitive name order. A key that does not
    /// exist is [`LoadOutcome::SourceMissing`], so optional sources can be
    /// listed without checking for them first; any other failure is an
    /// error.
    #[instrument(skip(self, reg, options))]
    pub fn read_all_values_from_path_as_options<R: RegistryRoot>(
        &self,
        reg: &RegistryAccess<R>,
        path: &str,
        options: &mut AppOptions,
    ) -> Result<LoadOutcome> {
        let map = match reg.read_all_values_into_map(path) {
            Ok(map) => map,
            Err(e) if e.is_not_found() => {
                debug!("Option source key does not exist");
                return Ok(LoadOutcome::SourceMissing);
            }
            Err(e) => return Err(e),
        };

        let mut entries: Vec<ValueMapEntry> = map.into_values().collect();
        entries.sort_by_key(|entry| entry.name.to_lowercase());

        let mut added = 0;
        for entry in entries {
            let Some(value) = OptionValue::from_value_data(&entry.value) else {
                trace!(
                    name = %entry.name,
                    value_type = %entry.value_type,
                    "Skipping value with no option form"
                );
                continue;
            };
            options.add_specified_value(SpecifiedValue::new(self.source, entry.name, value));
            added += 1;
        }

        debug!(added, "Loaded options");
        Ok(LoadOutcome::Loaded(added))
    }
}
