//! In-memory registry backend.
//!
//! [`MemoryRegistry`] behaves like a single predefined hive for everything
//! [`RegistryAccess`](crate::RegistryAccess) relies on: case-insensitive
//! names, `ERROR_MORE_DATA` on short buffers, access checks, handles that
//! outlive their key, narrow/wide conversion of text payloads, and the 32-bit
//! `WOW6432Node` view under `SOFTWARE`. Payloads are stored the way the OS
//! stores them, as wide data.

use crate::access::KeyAccess;
use crate::backend::{
    Disposition, EnumKeyOutcome, EnumValueOutcome, KeyInfo, QueryOutcome, RegistryKey, RegistryRoot,
};
use crate::error::{
    RegistryError, Result, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, ERROR_KEY_DELETED,
    ERROR_MORE_DATA,
};
use crate::utils::{names_equal, split_registry_path, thunk_narrow_to_wide, thunk_wide_to_narrow};
use crate::value::Charset;
use crate::value_type::ValueType;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

/// Name of the key holding the 32-bit view of `SOFTWARE`.
pub const WOW6432_NODE: &str = "WOW6432Node";

#[derive(Debug)]
struct StoredValue {
    name: String,
    value_type: ValueType,
    /// Wide payload.
    data: Vec<u8>,
}

#[derive(Debug)]
struct Node {
    id: u64,
    name: String,
    class: String,
    values: Vec<StoredValue>,
    /// Keyed by folded name, so enumeration comes out sorted.
    subkeys: BTreeMap<String, Node>,
    last_write: DateTime<Utc>,
}

impl Node {
    fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            class: String::new(),
            values: Vec::new(),
            subkeys: BTreeMap::new(),
            last_write: Utc::now(),
        }
    }

    fn value(&self, name: &str) -> Option<&StoredValue> {
        self.values.iter().find(|v| names_equal(&v.name, name))
    }

    fn touch(&mut self) {
        self.last_write = Utc::now();
    }
}

#[derive(Debug)]
struct Tree {
    root: Node,
    next_id: u64,
}

impl Tree {
    fn find(&self, segments: &[String]) -> Option<&Node> {
        let mut node = &self.root;
        for segment in segments {
            node = node.subkeys.get(segment)?;
        }
        Some(node)
    }

    fn find_mut(&mut self, segments: &[String]) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for segment in segments {
            node = node.subkeys.get_mut(segment)?;
        }
        Some(node)
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

/// Resolves a path to its original-case segments, applying the 32-bit view.
fn resolve(path: &str, access: KeyAccess) -> Vec<String> {
    let mut segments: Vec<String> = split_registry_path(path).map(str::to_string).collect();

    let view = access.view();
    let use_32bit_view = view.contains(KeyAccess::WOW64_32KEY)
        || (view.is_empty() && cfg!(target_pointer_width = "32"));
    if use_32bit_view
        && segments.first().is_some_and(|s| names_equal(s, "SOFTWARE"))
        && !segments.get(1).is_some_and(|s| names_equal(s, WOW6432_NODE))
    {
        segments.insert(1, WOW6432_NODE.to_string());
    }
    segments
}

/// A hermetic, thread-safe registry hive held in memory.
///
/// Clones share the same tree.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    inner: Arc<RwLock<Tree>>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    /// Creates an empty hive.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Tree {
                root: Node::new(0, ""),
                next_id: 1,
            })),
        }
    }

    /// Sets the class string of an existing key.
    pub fn set_class(&self, path: &str, class: &str) -> Result<()> {
        let segments: Vec<String> = resolve(path, KeyAccess::empty())
            .iter()
            .map(|s| fold(s))
            .collect();
        let mut tree = self.inner.write().expect("registry lock poisoned");
        let node = tree
            .find_mut(&segments)
            .ok_or_else(|| RegistryError::not_found("key", path))?;
        node.class = class.to_string();
        Ok(())
    }
}

impl RegistryRoot for MemoryRegistry {
    type Key = MemoryKey;

    fn open_key(&self, path: &str, access: KeyAccess) -> Result<MemoryKey> {
        let segments: Vec<String> = resolve(path, access).iter().map(|s| fold(s)).collect();
        let tree = self.inner.read().expect("registry lock poisoned");
        let node = tree
            .find(&segments)
            .ok_or_else(|| RegistryError::not_found("key", path))?;

        trace!(path, id = node.id, "opened key");
        Ok(MemoryKey {
            inner: Arc::clone(&self.inner),
            segments,
            id: node.id,
            access: access.rights(),
        })
    }

    fn create_key(&self, path: &str, access: KeyAccess) -> Result<(MemoryKey, Disposition)> {
        let names = resolve(path, access);
        let segments: Vec<String> = names.iter().map(|s| fold(s)).collect();

        let mut tree = self.inner.write().expect("registry lock poisoned");
        let mut next_id = tree.next_id;
        let mut disposition = Disposition::OpenedExisting;
        let mut node = &mut tree.root;
        for (name, segment) in names.iter().zip(&segments) {
            if !node.subkeys.contains_key(segment) {
                node.subkeys.insert(segment.clone(), Node::new(next_id, name));
                node.touch();
                next_id += 1;
                disposition = Disposition::CreatedNew;
            }
            node = node
                .subkeys
                .get_mut(segment)
                .ok_or_else(|| RegistryError::os(ERROR_KEY_DELETED))?;
        }
        let id = node.id;
        tree.next_id = next_id;

        debug!(path, ?disposition, "create-or-open key");
        Ok((
            MemoryKey {
                inner: Arc::clone(&self.inner),
                segments,
                id,
                access: access.rights(),
            },
            disposition,
        ))
    }

    fn delete_key(&self, path: &str, access: KeyAccess) -> Result<()> {
        let segments: Vec<String> = resolve(path, access).iter().map(|s| fold(s)).collect();
        let Some((leaf, parent)) = segments.split_last() else {
            return Err(RegistryError::os(ERROR_INVALID_PARAMETER));
        };

        let mut tree = self.inner.write().expect("registry lock poisoned");
        let parent = tree
            .find_mut(parent)
            .ok_or_else(|| RegistryError::not_found("key", path))?;
        match parent.subkeys.get(leaf) {
            None => return Err(RegistryError::not_found("key", path)),
            Some(node) if !node.subkeys.is_empty() => {
                return Err(RegistryError::os(ERROR_ACCESS_DENIED))
            }
            Some(_) => {}
        }
        parent.subkeys.remove(leaf);
        parent.touch();

        debug!(path, "deleted key");
        Ok(())
    }
}

/// Open handle into a [`MemoryRegistry`].
///
/// The handle stays valid if its key is deleted; every call then fails with
/// `ERROR_KEY_DELETED`, as on the OS.
#[derive(Debug)]
pub struct MemoryKey {
    inner: Arc<RwLock<Tree>>,
    segments: Vec<String>,
    id: u64,
    access: KeyAccess,
}

impl MemoryKey {
    fn require(&self, rights: KeyAccess) -> Result<()> {
        if !self.access.contains(rights) {
            return Err(RegistryError::os(ERROR_ACCESS_DENIED));
        }
        Ok(())
    }

    fn with_node<T>(&self, f: impl FnOnce(&Node) -> Result<T>) -> Result<T> {
        let tree = self.inner.read().expect("registry lock poisoned");
        let node = tree
            .find(&self.segments)
            .filter(|n| n.id == self.id)
            .ok_or_else(|| RegistryError::os(ERROR_KEY_DELETED))?;
        f(node)
    }

    fn with_node_mut<T>(&self, f: impl FnOnce(&mut Node) -> Result<T>) -> Result<T> {
        let mut tree = self.inner.write().expect("registry lock poisoned");
        let node = tree
            .find_mut(&self.segments)
            .filter(|n| n.id == self.id)
            .ok_or_else(|| RegistryError::os(ERROR_KEY_DELETED))?;
        f(node)
    }
}

fn payload_for(value: &StoredValue, charset: Charset) -> Vec<u8> {
    if charset == Charset::Narrow && value.value_type.is_text() {
        thunk_wide_to_narrow(&value.data)
    } else {
        value.data.clone()
    }
}

fn name_len(name: &str) -> u32 {
    name.encode_utf16().count() as u32
}

impl RegistryKey for MemoryKey {
    fn query_value(&self, name: &str, charset: Charset, buf: &mut [u8]) -> Result<QueryOutcome> {
        self.require(KeyAccess::QUERY_VALUE)?;
        self.with_node(|node| {
            let value = node
                .value(name)
                .ok_or_else(|| RegistryError::not_found("value", name))?;
            let payload = payload_for(value, charset);
            if payload.len() > buf.len() {
                return Ok(QueryOutcome::MoreData {
                    value_type: value.value_type,
                    required: payload.len(),
                });
            }
            buf[..payload.len()].copy_from_slice(&payload);
            Ok(QueryOutcome::Complete {
                value_type: value.value_type,
                len: payload.len(),
            })
        })
    }

    fn set_value(
        &self,
        name: &str,
        charset: Charset,
        value_type: ValueType,
        data: &[u8],
    ) -> Result<()> {
        self.require(KeyAccess::SET_VALUE)?;
        let data = if charset == Charset::Narrow && value_type.is_text() {
            thunk_narrow_to_wide(data)
        } else {
            data.to_vec()
        };
        self.with_node_mut(|node| {
            match node.values.iter_mut().find(|v| names_equal(&v.name, name)) {
                Some(existing) => {
                    existing.value_type = value_type;
                    existing.data = data;
                }
                None => node.values.push(StoredValue {
                    name: name.to_string(),
                    value_type,
                    data,
                }),
            }
            node.touch();
            Ok(())
        })
    }

    fn delete_value(&self, name: &str) -> Result<()> {
        self.require(KeyAccess::SET_VALUE)?;
        self.with_node_mut(|node| {
            let index = node
                .values
                .iter()
                .position(|v| names_equal(&v.name, name))
                .ok_or_else(|| RegistryError::not_found("value", name))?;
            node.values.remove(index);
            node.touch();
            Ok(())
        })
    }

    fn query_info(&self) -> Result<KeyInfo> {
        self.require(KeyAccess::QUERY_VALUE)?;
        self.with_node(|node| {
            Ok(KeyInfo {
                subkey_count: node.subkeys.len() as u32,
                max_subkey_name_len: node
                    .subkeys
                    .values()
                    .map(|k| name_len(&k.name))
                    .max()
                    .unwrap_or(0),
                max_class_len: node.subkeys.values().map(|k| name_len(&k.class)).max().unwrap_or(0),
                value_count: node.values.len() as u32,
                max_value_name_len: node
                    .values
                    .iter()
                    .map(|v| name_len(&v.name))
                    .max()
                    .unwrap_or(0),
                max_value_data_len: node
                    .values
                    .iter()
                    .map(|v| v.data.len() as u32)
                    .max()
                    .unwrap_or(0),
                last_write_time: Some(node.last_write),
            })
        })
    }

    fn enum_value(
        &self,
        index: u32,
        name: &mut String,
        data: &mut [u8],
    ) -> Result<Option<EnumValueOutcome>> {
        self.require(KeyAccess::QUERY_VALUE)?;
        self.with_node(|node| {
            let Some(value) = node.values.get(index as usize) else {
                return Ok(None);
            };
            let payload = payload_for(value, Charset::Wide);
            if payload.len() > data.len() {
                return Err(RegistryError::os(ERROR_MORE_DATA));
            }
            data[..payload.len()].copy_from_slice(&payload);
            name.clear();
            name.push_str(&value.name);
            Ok(Some(EnumValueOutcome {
                value_type: value.value_type,
                data_len: payload.len(),
            }))
        })
    }

    fn enum_key(
        &self,
        index: u32,
        name: &mut String,
        class: &mut String,
    ) -> Result<Option<EnumKeyOutcome>> {
        self.require(KeyAccess::ENUMERATE_SUB_KEYS)?;
        self.with_node(|node| {
            let Some(subkey) = node.subkeys.values().nth(index as usize) else {
                return Ok(None);
            };
            name.clear();
            name.push_str(&subkey.name);
            class.clear();
            class.push_str(&subkey.class);
            Ok(Some(EnumKeyOutcome {
                last_write_time: Some(subkey.last_write),
            }))
        })
    }
}

impl Drop for MemoryKey {
    fn drop(&mut self) {
        trace!(id = self.id, "closed key");
    }
}
