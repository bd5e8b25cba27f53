//! Typed conversions between raw registry payloads and native values.
//!
//! Every conversion is exact: the type tag must be one the shape accepts and
//! the payload size must agree with the tag. Nothing is coerced.

use crate::error::{RegistryError, Result};
use crate::utils::{decode_units, encode_units};
use crate::value_type::ValueType;
use byteorder::{ByteOrder, NativeEndian};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Character width of string payloads.
///
/// The registry keeps text as UTF-16; the narrow API variants convert it to
/// and from the ANSI code page on the way through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Charset {
    /// One byte per unit, ANSI code page.
    Narrow,
    /// Two bytes per unit, UTF-16.
    #[default]
    Wide,
}

impl Charset {
    /// Size of one character unit in bytes.
    pub fn unit_size(&self) -> usize {
        match self {
            Charset::Narrow => 1,
            Charset::Wide => 2,
        }
    }

    /// Bytes of a single terminator unit.
    fn terminator(&self) -> &'static [u8] {
        match self {
            Charset::Narrow => &[0],
            Charset::Wide => &[0, 0],
        }
    }
}

/// A value exactly as the OS stores it: type tag plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue {
    /// Type tag.
    pub value_type: ValueType,
    /// Payload bytes.
    pub data: Vec<u8>,
}

impl RawValue {
    /// Creates a raw value.
    pub fn new(value_type: ValueType, data: Vec<u8>) -> Self {
        Self { value_type, data }
    }
}

fn expect_type(accepted: ValueType, found: ValueType) -> Result<()> {
    if accepted != found {
        return Err(RegistryError::type_mismatch(accepted, found));
    }
    Ok(())
}

/// Splits a payload into character units, checking it holds whole units.
fn unit_chunks(
    value_type: ValueType,
    data: &[u8],
    charset: Charset,
) -> Result<std::slice::ChunksExact<'_, u8>> {
    let unit = charset.unit_size();
    if data.len() % unit != 0 {
        return Err(RegistryError::size_mismatch(
            value_type,
            data.len() - data.len() % unit + unit,
            data.len(),
        ));
    }
    Ok(data.chunks_exact(unit))
}

fn is_terminator(chunk: &[u8]) -> bool {
    chunk.iter().all(|&b| b == 0)
}

/// Decodes a `REG_SZ` or `REG_EXPAND_SZ` payload.
///
/// The trailing terminator is optional: some writers omit it. When the last
/// unit is a terminator the string is one unit shorter than the payload,
/// otherwise the whole payload is the string.
pub fn decode_string(value_type: ValueType, data: &[u8], charset: Charset) -> Result<String> {
    if !value_type.is_string() {
        return Err(RegistryError::type_mismatch(ValueType::String, value_type));
    }

    let units = unit_chunks(value_type, data, charset)?.count();
    let len = match data.chunks_exact(charset.unit_size()).last() {
        Some(last) if is_terminator(last) => units - 1,
        _ => units,
    };

    decode_units(&data[..len * charset.unit_size()], charset)
}

/// Encodes a string as `REG_SZ`: the characters plus one terminator unit.
pub fn encode_string(value: &str, charset: Charset) -> Result<RawValue> {
    let mut data = encode_units(value, charset)?;
    data.extend_from_slice(charset.terminator());
    Ok(RawValue::new(ValueType::String, data))
}

/// Same as [`encode_string`] but tags the payload `REG_EXPAND_SZ`.
pub fn encode_expand_string(value: &str, charset: Charset) -> Result<RawValue> {
    let mut raw = encode_string(value, charset)?;
    raw.value_type = ValueType::ExpandString;
    Ok(raw)
}

/// Decodes a `REG_DWORD` payload (exactly 4 bytes, native order).
pub fn decode_dword(value_type: ValueType, data: &[u8]) -> Result<u32> {
    expect_type(ValueType::Dword, value_type)?;
    if data.len() != 4 {
        return Err(RegistryError::size_mismatch(value_type, 4, data.len()));
    }
    Ok(NativeEndian::read_u32(data))
}

/// Encodes a `REG_DWORD` payload.
pub fn encode_dword(value: u32) -> RawValue {
    let mut data = vec![0u8; 4];
    NativeEndian::write_u32(&mut data, value);
    RawValue::new(ValueType::Dword, data)
}

/// Decodes a `REG_QWORD` payload (exactly 8 bytes, native order).
pub fn decode_qword(value_type: ValueType, data: &[u8]) -> Result<u64> {
    expect_type(ValueType::Qword, value_type)?;
    if data.len() != 8 {
        return Err(RegistryError::size_mismatch(value_type, 8, data.len()));
    }
    Ok(NativeEndian::read_u64(data))
}

/// Encodes a `REG_QWORD` payload.
pub fn encode_qword(value: u64) -> RawValue {
    let mut data = vec![0u8; 8];
    NativeEndian::write_u64(&mut data, value);
    RawValue::new(ValueType::Qword, data)
}

/// Decodes a `REG_MULTI_SZ` payload.
///
/// The list ends at the first empty string. Payloads that lack the final
/// terminator(s) are accepted, as with single strings.
pub fn decode_multi_string(
    value_type: ValueType,
    data: &[u8],
    charset: Charset,
) -> Result<Vec<String>> {
    expect_type(ValueType::MultiString, value_type)?;

    let unit = charset.unit_size();
    let mut strings = Vec::new();
    let mut start = 0;
    for (i, chunk) in unit_chunks(value_type, data, charset)?.enumerate() {
        if !is_terminator(chunk) {
            continue;
        }
        let end = i * unit;
        if end == start {
            return Ok(strings);
        }
        strings.push(decode_units(&data[start..end], charset)?);
        start = end + unit;
    }

    if start < data.len() {
        strings.push(decode_units(&data[start..], charset)?);
    }
    Ok(strings)
}

/// Encodes a `REG_MULTI_SZ` payload: each string plus its terminator, plus
/// one extra terminator closing the list.
///
/// # Errors
///
/// Empty strings and strings with embedded terminators cannot be stored;
/// they would end the list early on the way back.
pub fn encode_multi_string<S: AsRef<str>>(values: &[S], charset: Charset) -> Result<RawValue> {
    let terminator = charset.terminator();
    let mut data = Vec::new();
    for value in values {
        let value = value.as_ref();
        if value.is_empty() || value.contains('\0') {
            return Err(RegistryError::InvalidString(format!(
                "{:?} cannot be stored in a multi-string",
                value
            )));
        }
        data.extend(encode_units(value, charset)?);
        data.extend_from_slice(terminator);
    }
    if values.is_empty() {
        data.extend_from_slice(terminator);
    }
    data.extend_from_slice(terminator);
    Ok(RawValue::new(ValueType::MultiString, data))
}

/// Decodes a `REG_BINARY` payload.
pub fn decode_binary(value_type: ValueType, data: &[u8]) -> Result<Vec<u8>> {
    expect_type(ValueType::Binary, value_type)?;
    Ok(data.to_vec())
}

/// Copies any payload verbatim, whatever its type.
pub fn decode_binary_fallback(_value_type: ValueType, data: &[u8]) -> Vec<u8> {
    data.to_vec()
}

/// Encodes a `REG_BINARY` payload.
pub fn encode_binary(data: &[u8]) -> RawValue {
    RawValue::new(ValueType::Binary, data.to_vec())
}

/// Parsed registry value data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueData {
    /// String value.
    String(String),

    /// Expandable string value.
    ExpandString(String),

    /// 32-bit integer.
    Dword(u32),

    /// 64-bit integer.
    Qword(u64),

    /// Multiple strings.
    MultiString(Vec<String>),

    /// Binary data.
    Binary(Vec<u8>),

    /// Any other type, kept as raw bytes.
    Unhandled {
        /// Stored type tag.
        value_type: ValueType,
        /// Payload bytes.
        data: Vec<u8>,
    },
}

impl ValueData {
    /// Parses value data based on the value type.
    ///
    /// Types outside the supported set come back as `Unhandled`; supported
    /// types with a malformed payload are an error.
    pub fn decode(value_type: ValueType, data: &[u8], charset: Charset) -> Result<Self> {
        match value_type {
            ValueType::String => Ok(ValueData::String(decode_string(value_type, data, charset)?)),
            ValueType::ExpandString => Ok(ValueData::ExpandString(decode_string(
                value_type, data, charset,
            )?)),
            ValueType::Dword => Ok(ValueData::Dword(decode_dword(value_type, data)?)),
            ValueType::Qword => Ok(ValueData::Qword(decode_qword(value_type, data)?)),
            ValueType::MultiString => Ok(ValueData::MultiString(decode_multi_string(
                value_type, data, charset,
            )?)),
            ValueType::Binary => Ok(ValueData::Binary(decode_binary(value_type, data)?)),
            _ => Ok(ValueData::Unhandled {
                value_type,
                data: decode_binary_fallback(value_type, data),
            }),
        }
    }

    /// Decodes a raw value.
    pub fn from_raw(raw: &RawValue, charset: Charset) -> Result<Self> {
        Self::decode(raw.value_type, &raw.data, charset)
    }

    /// Encodes this value into its OS representation.
    pub fn encode(&self, charset: Charset) -> Result<RawValue> {
        match self {
            ValueData::String(s) => encode_string(s, charset),
            ValueData::ExpandString(s) => encode_expand_string(s, charset),
            ValueData::Dword(d) => Ok(encode_dword(*d)),
            ValueData::Qword(q) => Ok(encode_qword(*q)),
            ValueData::MultiString(strings) => encode_multi_string(strings.as_slice(), charset),
            ValueData::Binary(b) => Ok(encode_binary(b)),
            ValueData::Unhandled { value_type, data } => {
                Ok(RawValue::new(*value_type, data.clone()))
            }
        }
    }

    /// Returns the type tag this value is stored under.
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueData::String(_) => ValueType::String,
            ValueData::ExpandString(_) => ValueType::ExpandString,
            ValueData::Dword(_) => ValueType::Dword,
            ValueData::Qword(_) => ValueType::Qword,
            ValueData::MultiString(_) => ValueType::MultiString,
            ValueData::Binary(_) => ValueType::Binary,
            ValueData::Unhandled { value_type, .. } => *value_type,
        }
    }

    /// Returns the string for `String` and `ExpandString` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueData::String(s) | ValueData::ExpandString(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number for `Dword` values.
    pub fn as_dword(&self) -> Option<u32> {
        match self {
            ValueData::Dword(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the number for `Qword` values.
    pub fn as_qword(&self) -> Option<u64> {
        match self {
            ValueData::Qword(q) => Some(*q),
            _ => None,
        }
    }

    /// Returns the list for `MultiString` values.
    pub fn as_multi_string(&self) -> Option<&[String]> {
        match self {
            ValueData::MultiString(strings) => Some(strings),
            _ => None,
        }
    }

    /// Returns the bytes for `Binary` values.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            ValueData::Binary(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueData::String(s) | ValueData::ExpandString(s) => f.write_str(s),
            ValueData::Dword(d) => write!(f, "{} (0x{:08X})", d, d),
            ValueData::Qword(q) => write!(f, "{} (0x{:016X})", q, q),
            ValueData::MultiString(strings) => f.write_str(&strings.join(", ")),
            ValueData::Binary(b) => f.write_str(&hex::encode(b)),
            ValueData::Unhandled { value_type, data } => {
                write!(f, "{}: {}", value_type, hex::encode(data))
            }
        }
    }
}
