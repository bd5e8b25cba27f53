//! Backend over the Win32 registry API.

use crate::access::KeyAccess;
use crate::backend::{
    Disposition, EnumKeyOutcome, EnumValueOutcome, KeyInfo, QueryOutcome, RegistryKey, RegistryRoot,
};
use crate::error::{RegistryError, Result, ERROR_MORE_DATA, ERROR_NO_MORE_ITEMS};
use crate::utils::{decode_wide, encode_narrow, filetime_to_datetime, to_wide_with_nul};
use crate::value::Charset;
use crate::value_type::ValueType;
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::ptr;
use tracing::trace;
use windows_sys::Win32::Foundation::{ERROR_SUCCESS, FILETIME};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteKeyExW, RegDeleteValueW, RegEnumKeyExW, RegEnumValueW,
    RegOpenKeyExW, RegQueryInfoKeyW, RegQueryValueExA, RegQueryValueExW, RegSetValueExA,
    RegSetValueExW, HKEY, HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER,
    HKEY_LOCAL_MACHINE, HKEY_USERS, REG_OPTION_NON_VOLATILE,
};

/// Longest key name the registry allows, plus terminator.
const MAX_KEY_NAME_CHARS: usize = 256;

/// Longest value name the registry allows, plus terminator.
const MAX_VALUE_NAME_CHARS: usize = 16_384;

/// Returns early with the mapped error unless the call succeeded.
macro_rules! reg_call {
    ($expr:expr, $item:expr, $name:expr) => {{
        let status = $expr;
        if status != ERROR_SUCCESS {
            return Err(RegistryError::os_with_context(status, $item, $name));
        }
    }};
}

fn filetime_to_utc(ft: &FILETIME) -> Option<DateTime<Utc>> {
    filetime_to_datetime((u64::from(ft.dwHighDateTime) << 32) | u64::from(ft.dwLowDateTime))
}

fn narrow_with_nul(s: &str) -> Result<Vec<u8>> {
    let mut bytes = encode_narrow(s)?;
    bytes.push(0);
    Ok(bytes)
}

fn buffer_len(buf: &[u8]) -> u32 {
    u32::try_from(buf.len()).unwrap_or(u32::MAX)
}

/// The predefined hives a [`RegistryAccess`](crate::RegistryAccess) can be
/// bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedKey {
    /// `HKEY_CLASSES_ROOT`
    ClassesRoot,
    /// `HKEY_CURRENT_USER`
    CurrentUser,
    /// `HKEY_LOCAL_MACHINE`
    LocalMachine,
    /// `HKEY_USERS`
    Users,
    /// `HKEY_CURRENT_CONFIG`
    CurrentConfig,
}

impl PredefinedKey {
    fn hkey(&self) -> HKEY {
        match self {
            PredefinedKey::ClassesRoot => HKEY_CLASSES_ROOT,
            PredefinedKey::CurrentUser => HKEY_CURRENT_USER,
            PredefinedKey::LocalMachine => HKEY_LOCAL_MACHINE,
            PredefinedKey::Users => HKEY_USERS,
            PredefinedKey::CurrentConfig => HKEY_CURRENT_CONFIG,
        }
    }
}

impl RegistryRoot for PredefinedKey {
    type Key = NativeKey;

    fn open_key(&self, path: &str, access: KeyAccess) -> Result<NativeKey> {
        let wide_path = to_wide_with_nul(path);
        let mut hkey: HKEY = ptr::null_mut();
        reg_call!(
            unsafe {
                RegOpenKeyExW(self.hkey(), wide_path.as_ptr(), 0, access.as_u32(), &mut hkey)
            },
            "key",
            path
        );
        trace!(path, "Opened key");
        Ok(NativeKey::new(hkey))
    }

    fn create_key(&self, path: &str, access: KeyAccess) -> Result<(NativeKey, Disposition)> {
        let wide_path = to_wide_with_nul(path);
        let mut hkey: HKEY = ptr::null_mut();
        let mut disposition = 0u32;
        reg_call!(
            unsafe {
                RegCreateKeyExW(
                    self.hkey(),
                    wide_path.as_ptr(),
                    0,
                    ptr::null(),
                    REG_OPTION_NON_VOLATILE,
                    access.as_u32(),
                    ptr::null(),
                    &mut hkey,
                    &mut disposition,
                )
            },
            "key",
            path
        );
        Ok((NativeKey::new(hkey), Disposition::from_u32(disposition)))
    }

    fn delete_key(&self, path: &str, access: KeyAccess) -> Result<()> {
        let wide_path = to_wide_with_nul(path);
        reg_call!(
            unsafe { RegDeleteKeyExW(self.hkey(), wide_path.as_ptr(), access.view().as_u32(), 0) },
            "key",
            path
        );
        Ok(())
    }
}

/// An open registry key handle, closed on drop.
#[derive(Debug)]
pub struct NativeKey {
    hkey: HKEY,
    /// Scratch space for enumerated names.
    name_buf: RefCell<Vec<u16>>,
}

impl NativeKey {
    fn new(hkey: HKEY) -> Self {
        Self {
            hkey,
            name_buf: RefCell::new(Vec::new()),
        }
    }

    fn query_raw(&self, name: &str, charset: Charset, buf: &mut [u8]) -> (u32, u32, u32) {
        let mut value_type = 0u32;
        let mut size = buffer_len(buf);
        let data = if buf.is_empty() { ptr::null_mut() } else { buf.as_mut_ptr() };
        let status = match charset {
            Charset::Wide => {
                let wide_name = to_wide_with_nul(name);
                unsafe {
                    RegQueryValueExW(
                        self.hkey,
                        wide_name.as_ptr(),
                        ptr::null(),
                        &mut value_type,
                        data,
                        &mut size,
                    )
                }
            }
            Charset::Narrow => match narrow_with_nul(name) {
                Ok(narrow_name) => unsafe {
                    RegQueryValueExA(
                        self.hkey,
                        narrow_name.as_ptr(),
                        ptr::null(),
                        &mut value_type,
                        data,
                        &mut size,
                    )
                },
                // A name the code page cannot express cannot exist under it.
                Err(_) => crate::error::ERROR_FILE_NOT_FOUND,
            },
        };
        (status, value_type, size)
    }
}

impl RegistryKey for NativeKey {
    fn query_value(&self, name: &str, charset: Charset, buf: &mut [u8]) -> Result<QueryOutcome> {
        let (status, raw_type, size) = self.query_raw(name, charset, buf);
        let value_type = ValueType::from_u32(raw_type);
        let size = size as usize;
        match status {
            // With no buffer the call only reports the size.
            ERROR_SUCCESS if buf.is_empty() && size > 0 => Ok(QueryOutcome::MoreData {
                value_type,
                required: size,
            }),
            ERROR_SUCCESS => Ok(QueryOutcome::Complete { value_type, len: size }),
            ERROR_MORE_DATA => Ok(QueryOutcome::MoreData {
                value_type,
                required: size,
            }),
            code => Err(RegistryError::os_with_context(code, "value", name)),
        }
    }

    fn set_value(
        &self,
        name: &str,
        charset: Charset,
        value_type: ValueType,
        data: &[u8],
    ) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| {
            RegistryError::size_mismatch(value_type, u32::MAX as usize, data.len())
        })?;
        match charset {
            Charset::Wide => {
                let wide_name = to_wide_with_nul(name);
                reg_call!(
                    unsafe {
                        RegSetValueExW(
                            self.hkey,
                            wide_name.as_ptr(),
                            0,
                            value_type.as_u32(),
                            data.as_ptr(),
                            len,
                        )
                    },
                    "value",
                    name
                );
            }
            Charset::Narrow => {
                let narrow_name = narrow_with_nul(name)?;
                reg_call!(
                    unsafe {
                        RegSetValueExA(
                            self.hkey,
                            narrow_name.as_ptr(),
                            0,
                            value_type.as_u32(),
                            data.as_ptr(),
                            len,
                        )
                    },
                    "value",
                    name
                );
            }
        }
        Ok(())
    }

    fn delete_value(&self, name: &str) -> Result<()> {
        let wide_name = to_wide_with_nul(name);
        reg_call!(unsafe { RegDeleteValueW(self.hkey, wide_name.as_ptr()) }, "value", name);
        Ok(())
    }

    fn query_info(&self) -> Result<KeyInfo> {
        let mut info = KeyInfo {
            subkey_count: 0,
            max_subkey_name_len: 0,
            max_class_len: 0,
            value_count: 0,
            max_value_name_len: 0,
            max_value_data_len: 0,
            last_write_time: None,
        };
        let mut last_write = FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        };
        reg_call!(
            unsafe {
                RegQueryInfoKeyW(
                    self.hkey,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null(),
                    &mut info.subkey_count,
                    &mut info.max_subkey_name_len,
                    &mut info.max_class_len,
                    &mut info.value_count,
                    &mut info.max_value_name_len,
                    &mut info.max_value_data_len,
                    ptr::null_mut(),
                    &mut last_write,
                )
            },
            "key",
            ""
        );
        info.last_write_time = filetime_to_utc(&last_write);
        Ok(info)
    }

    fn enum_value(
        &self,
        index: u32,
        name: &mut String,
        data: &mut [u8],
    ) -> Result<Option<EnumValueOutcome>> {
        let mut value_type = 0u32;
        let capacity = data.len();
        // A null data pointer makes the call succeed with the full size, so
        // an empty buffer is passed as a one-byte scratch.
        let mut scratch = [0u8; 1];
        let buf: &mut [u8] = if data.is_empty() { &mut scratch } else { data };
        let mut data_len = buffer_len(buf);

        let mut name_buf = self.name_buf.borrow_mut();
        name_buf.resize(MAX_VALUE_NAME_CHARS, 0);
        let mut name_len = MAX_VALUE_NAME_CHARS as u32;
        let status = unsafe {
            RegEnumValueW(
                self.hkey,
                index,
                name_buf.as_mut_ptr(),
                &mut name_len,
                ptr::null(),
                &mut value_type,
                buf.as_mut_ptr(),
                &mut data_len,
            )
        };

        match status {
            ERROR_SUCCESS if data_len as usize > capacity => {
                Err(RegistryError::os(ERROR_MORE_DATA))
            }
            ERROR_SUCCESS => {
                *name = decode_wide(&name_buf[..name_len as usize])?;
                Ok(Some(EnumValueOutcome {
                    value_type: ValueType::from_u32(value_type),
                    data_len: data_len as usize,
                }))
            }
            ERROR_NO_MORE_ITEMS => Ok(None),
            code => Err(RegistryError::os(code)),
        }
    }

    fn enum_key(
        &self,
        index: u32,
        name: &mut String,
        class: &mut String,
    ) -> Result<Option<EnumKeyOutcome>> {
        let mut name_buf = [0u16; MAX_KEY_NAME_CHARS];
        let mut class_buf = self.name_buf.borrow_mut();
        let mut last_write = FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        };

        // The class buffer is sized from the key's maximum on a short read.
        let mut class_capacity = class_buf.len().max(MAX_KEY_NAME_CHARS);
        for _ in 0..2 {
            class_buf.resize(class_capacity, 0);
            let mut name_len = MAX_KEY_NAME_CHARS as u32;
            let mut class_len = class_capacity as u32;
            let status = unsafe {
                RegEnumKeyExW(
                    self.hkey,
                    index,
                    name_buf.as_mut_ptr(),
                    &mut name_len,
                    ptr::null(),
                    class_buf.as_mut_ptr(),
                    &mut class_len,
                    &mut last_write,
                )
            };
            match status {
                ERROR_SUCCESS => {
                    *name = decode_wide(&name_buf[..name_len as usize])?;
                    *class = decode_wide(&class_buf[..class_len as usize])?;
                    return Ok(Some(EnumKeyOutcome {
                        last_write_time: filetime_to_utc(&last_write),
                    }));
                }
                ERROR_NO_MORE_ITEMS => return Ok(None),
                ERROR_MORE_DATA => {
                    drop(class_buf);
                    let info = self.query_info()?;
                    class_buf = self.name_buf.borrow_mut();
                    class_capacity = info.max_class_len as usize + 1;
                }
                code => return Err(RegistryError::os(code)),
            }
        }
        Err(RegistryError::os(ERROR_MORE_DATA))
    }
}

impl Drop for NativeKey {
    fn drop(&mut self) {
        if !self.hkey.is_null() {
            let status = unsafe { RegCloseKey(self.hkey) };
            debug_assert_eq!(status, ERROR_SUCCESS, "RegCloseKey failed");
        }
    }
}
