//! Utility functions for character encoding, timestamps and key paths.

use crate::error::{RegistryError, Result};
use crate::value::Charset;
use byteorder::{ByteOrder, NativeEndian};
use chrono::{DateTime, Utc};
use encoding_rs::WINDOWS_1252;

/// Windows FILETIME is 100-nanosecond intervals since 1601-01-01.
/// Unix epoch is 1970-01-01, difference is 11644473600 seconds.
const FILETIME_UNIX_DIFF: i64 = 11644473600;

/// Characters trimmed from path segments before joining.
const PATH_SEPARATORS: &[char] = &['\\', '/'];

/// Encodes a string as UTF-16 code units without a terminator.
pub fn encode_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Encodes a string as UTF-16 code units followed by a terminator.
pub fn to_wide_with_nul(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(Some(0)).collect()
}

/// Decodes UTF-16 code units, rejecting unpaired surrogates.
pub fn decode_wide(units: &[u16]) -> Result<String> {
    String::from_utf16(units).map_err(|e| RegistryError::InvalidString(e.to_string()))
}

/// Serializes UTF-16 code units into native-order bytes.
pub fn wide_to_bytes(units: &[u16]) -> Vec<u8> {
    let mut bytes = vec![0u8; units.len() * 2];
    NativeEndian::write_u16_into(units, &mut bytes);
    bytes
}

/// Reads native-order bytes as UTF-16 code units.
///
/// # Errors
///
/// Returns an error if the byte count is odd.
pub fn bytes_to_wide(bytes: &[u8]) -> Result<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return Err(RegistryError::InvalidString(format!(
            "wide payload has odd length {}",
            bytes.len()
        )));
    }
    let mut units = vec![0u16; bytes.len() / 2];
    NativeEndian::read_u16_into(bytes, &mut units);
    Ok(units)
}

/// Encodes a string in the narrow (ANSI) code page.
///
/// # Errors
///
/// Returns an error if the string holds characters the code page cannot
/// represent; silently substituting them would corrupt the stored value.
pub fn encode_narrow(s: &str) -> Result<Vec<u8>> {
    let (encoded, _encoding, had_errors) = WINDOWS_1252.encode(s);
    if had_errors {
        return Err(RegistryError::InvalidString(format!(
            "{:?} is not representable in the narrow code page",
            s
        )));
    }
    Ok(encoded.into_owned())
}

/// Decodes bytes from the narrow (ANSI) code page.
///
/// Every byte maps to a character in Windows-1252, so this cannot fail.
pub fn decode_narrow(bytes: &[u8]) -> String {
    WINDOWS_1252
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}

/// Encodes a string into payload bytes of the given charset, without a
/// terminator.
pub fn encode_units(s: &str, charset: Charset) -> Result<Vec<u8>> {
    match charset {
        Charset::Narrow => encode_narrow(s),
        Charset::Wide => Ok(wide_to_bytes(&encode_wide(s))),
    }
}

/// Decodes payload bytes of the given charset. The caller has already cut
/// off any terminator.
pub fn decode_units(bytes: &[u8], charset: Charset) -> Result<String> {
    match charset {
        Charset::Narrow => Ok(decode_narrow(bytes)),
        Charset::Wide => decode_wide(&bytes_to_wide(bytes)?),
    }
}

/// Converts a wide text payload to the narrow code page the way the ANSI
/// registry functions do: unit for unit, unmappable characters become `?`.
pub fn thunk_wide_to_narrow(data: &[u8]) -> Vec<u8> {
    let even = data.len() - data.len() % 2;
    let mut units = vec![0u16; even / 2];
    NativeEndian::read_u16_into(&data[..even], &mut units);

    let mut narrow = Vec::with_capacity(units.len());
    let mut buf = [0u8; 4];
    for ch in char::decode_utf16(units.iter().copied()) {
        match ch {
            Ok(c) if c.is_ascii() => narrow.push(c as u8),
            Ok(c) => {
                let (encoded, _encoding, had_errors) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
                if had_errors || encoded.len() != 1 {
                    narrow.push(b'?');
                } else {
                    narrow.push(encoded[0]);
                }
            }
            Err(_) => narrow.push(b'?'),
        }
    }
    narrow
}

/// Converts a narrow text payload to wide bytes, unit for unit.
pub fn thunk_narrow_to_wide(data: &[u8]) -> Vec<u8> {
    wide_to_bytes(&encode_wide(&decode_narrow(data)))
}

/// Converts a FILETIME value to a UTC timestamp.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    let seconds = (filetime / 10_000_000) as i64 - FILETIME_UNIX_DIFF;
    let nanos = ((filetime % 10_000_000) * 100) as u32;

    DateTime::from_timestamp(seconds, nanos)
}

/// Joins a key path prefix and a component with a single backslash,
/// trimming redundant separators at the boundary.
///
/// # Examples
///
/// ```rust
/// # use reg_access::utils::make_registry_path;
/// assert_eq!(make_registry_path("SOFTWARE\\", "\\Vendor\\"), "SOFTWARE\\Vendor");
/// ```
pub fn make_registry_path(prefix: &str, component: &str) -> String {
    format!(
        "{}\\{}",
        prefix.trim_matches(PATH_SEPARATORS),
        component.trim_matches(PATH_SEPARATORS)
    )
}

/// Joins any number of path segments, see [`make_registry_path`].
pub fn join_registry_path<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| p.as_ref().trim_matches(PATH_SEPARATORS))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\\")
}

/// Splits a key path into its non-empty segments. Both separators are
/// accepted.
pub fn split_registry_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATORS).filter(|s| !s.is_empty())
}

/// Case-insensitive name comparison, as the registry compares key and
/// value names.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// Case-insensitive prefix test on key paths, treating `/` and `\` alike.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let normalize = |s: &str| s.replace('/', "\\").to_lowercase();
    normalize(path).starts_with(&normalize(prefix))
}
