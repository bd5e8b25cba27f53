//! Behaviour tests for `RegistryAccess` against the in-memory backend.

use reg_access::backend::{EnumKeyOutcome, EnumValueOutcome};
use reg_access::{
    AccessConfig, Charset, DeleteOptions, Disposition, KeyAccess, KeyInfo, MemoryRegistry,
    QueryOutcome, RegistryAccess, RegistryError, RegistryKey, RegistryRoot, Result, ValueData,
    ValueType, Wow64KeyAccess,
};
use std::cell::Cell;

const TEST_KEY: &str = "SOFTWARE\\reg-access-test";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn setup() -> RegistryAccess<MemoryRegistry> {
    init_tracing();
    let reg = RegistryAccess::new(MemoryRegistry::new());
    reg.ensure_key_exists(TEST_KEY).unwrap();
    reg
}

#[test]
fn test_roundtrip_every_shape() {
    let reg = setup();

    reg.write_string(TEST_KEY, "wide", "Wide \u{e9}\u{65e5}").unwrap();
    reg.write_string_narrow(TEST_KEY, "narrow", "Narrow caf\u{e9}").unwrap();
    reg.write_dword(TEST_KEY, "dword", 0xDEAD_BEEF).unwrap();
    reg.write_qword(TEST_KEY, "qword", u64::MAX - 7).unwrap();
    reg.write_multi_string(TEST_KEY, "multi", &["one", "two", "three"]).unwrap();
    reg.write_binary(TEST_KEY, "blob", &[0, 1, 2, 0xff]).unwrap();

    assert_eq!(reg.read_string(TEST_KEY, "wide").unwrap(), "Wide \u{e9}\u{65e5}");
    assert_eq!(reg.read_string_narrow(TEST_KEY, "narrow").unwrap(), "Narrow caf\u{e9}");
    assert_eq!(reg.read_dword(TEST_KEY, "dword").unwrap(), 0xDEAD_BEEF);
    assert_eq!(reg.read_qword(TEST_KEY, "qword").unwrap(), u64::MAX - 7);
    assert_eq!(reg.read_multi_string(TEST_KEY, "multi").unwrap(), vec!["one", "two", "three"]);
    assert_eq!(reg.read_binary(TEST_KEY, "blob").unwrap(), vec![0, 1, 2, 0xff]);
}

#[test]
fn test_strings_cross_charsets() {
    let reg = setup();

    reg.write_string(TEST_KEY, "w", "plain").unwrap();
    assert_eq!(reg.read_string_narrow(TEST_KEY, "w").unwrap(), "plain");

    reg.write_string_narrow(TEST_KEY, "n", "caf\u{e9}").unwrap();
    assert_eq!(reg.read_string(TEST_KEY, "n").unwrap(), "caf\u{e9}");
}

#[test]
fn test_narrow_write_rejects_unmappable_text() {
    let reg = setup();
    let err = reg.write_string_narrow(TEST_KEY, "n", "\u{65e5}\u{672c}").unwrap_err();
    assert!(matches!(err, RegistryError::InvalidString(_)));
    assert!(reg.read_string(TEST_KEY, "n").unwrap_err().is_not_found());
}

#[test]
fn test_wide_string_payload_layout() {
    let reg = setup();
    reg.write_string(TEST_KEY, "s", "abc").unwrap();

    let raw = reg.read_value_base(TEST_KEY, "s").unwrap();
    assert_eq!(raw.value_type, ValueType::String);
    assert_eq!(raw.data.len(), (3 + 1) * 2);
    assert_eq!(&raw.data[6..], &[0, 0]);

    let raw = reg.read_value_base_with(TEST_KEY, "s", Charset::Narrow).unwrap();
    assert_eq!(raw.data, b"abc\0".to_vec());
}

#[test]
fn test_unterminated_string_is_read_whole() {
    let reg = setup();
    let data: Vec<u8> = "abc".encode_utf16().flat_map(u16::to_ne_bytes).collect();
    reg.write_value_base(TEST_KEY, "raw", ValueType::String, &data).unwrap();
    assert_eq!(reg.read_string(TEST_KEY, "raw").unwrap(), "abc");
}

#[test]
fn test_expand_string_reads_unexpanded() {
    let reg = setup();
    reg.write_value(TEST_KEY, "path", &ValueData::ExpandString("%SystemRoot%\\x".into()))
        .unwrap();
    assert_eq!(reg.read_string(TEST_KEY, "path").unwrap(), "%SystemRoot%\\x");
    assert_eq!(
        reg.read_value(TEST_KEY, "path").unwrap(),
        ValueData::ExpandString("%SystemRoot%\\x".into())
    );
}

#[test]
fn test_default_only_replaces_absence() {
    let reg = setup();

    assert_eq!(reg.read_dword_or(TEST_KEY, "missing", 42).unwrap(), 42);
    assert_eq!(reg.read_string_or(TEST_KEY, "missing", "dflt").unwrap(), "dflt");
    assert_eq!(reg.read_qword_or(TEST_KEY, "missing", 9).unwrap(), 9);
    assert_eq!(reg.read_binary_or(TEST_KEY, "missing", vec![1]).unwrap(), vec![1]);
    assert_eq!(
        reg.read_multi_string_or(TEST_KEY, "missing", vec!["x".into()]).unwrap(),
        vec!["x"]
    );
    assert!(reg.read_dword(TEST_KEY, "missing").unwrap_err().is_not_found());

    // A missing key counts as absence too.
    assert_eq!(reg.read_dword_or("SOFTWARE\\nowhere", "v", 1).unwrap(), 1);

    // Anything else still fails.
    reg.write_string(TEST_KEY, "text", "12").unwrap();
    assert!(reg.read_dword_or(TEST_KEY, "text", 42).unwrap_err().is_type_mismatch());
}

#[test]
fn test_existence_lifecycle() {
    let reg = setup();
    let key = "SOFTWARE\\reg-access-test\\Lifecycle";

    assert!(!reg.check_key_exists(key));
    reg.ensure_key_exists(key).unwrap();
    reg.ensure_key_exists(key).unwrap();
    assert!(reg.check_key_exists(key));
    assert!(reg.does_key_exist(key));

    reg.delete_key(key, &DeleteOptions::unguarded()).unwrap();
    assert!(!reg.check_key_exists(key));
}

#[test]
fn test_delete_missing_key_is_not_found() {
    let reg = setup();
    let err = reg
        .delete_key("SOFTWARE\\reg-access-test\\Gone", &DeleteOptions::unguarded())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_safe_delete_guard_refuses_and_keeps_data() {
    let reg = setup();
    let key = "SOFTWARE\\reg-access-test\\Guarded";
    reg.ensure_key_exists(key).unwrap();
    reg.write_dword(key, "v", 1).unwrap();

    let guard = DeleteOptions::default().with_safe_delete_path("SOFTWARE\\Elsewhere");
    assert_eq!(
        reg.delete_value(key, "v", &guard).unwrap_err(),
        RegistryError::SafeDeleteRefused { path: key.to_string() }
    );
    assert!(matches!(
        reg.delete_key(key, &guard).unwrap_err(),
        RegistryError::SafeDeleteRefused { .. }
    ));
    assert_eq!(reg.read_dword(key, "v").unwrap(), 1);
    assert!(reg.check_key_exists(key));

    let guard = DeleteOptions::default().with_safe_delete_path("software\\REG-ACCESS-TEST");
    reg.delete_value(key, "v", &guard).unwrap();
    assert!(reg.read_dword(key, "v").unwrap_err().is_not_found());
    reg.delete_key(key, &guard).unwrap();
    assert!(!reg.check_key_exists(key));
}

#[test]
fn test_delete_key_with_children_fails() {
    let reg = setup();
    reg.ensure_key_exists("SOFTWARE\\reg-access-test\\P\\C").unwrap();
    let err = reg
        .delete_key("SOFTWARE\\reg-access-test\\P", &DeleteOptions::unguarded())
        .unwrap_err();
    assert_eq!(err.os_code(), Some(5));
}

#[test]
fn test_enumeration_visits_every_shape() {
    let reg = setup();
    reg.write_string(TEST_KEY, "s", "text").unwrap();
    reg.write_dword(TEST_KEY, "d", 7).unwrap();
    reg.write_qword(TEST_KEY, "q", 1 << 40).unwrap();
    reg.write_multi_string(TEST_KEY, "m", &["a", "b"]).unwrap();
    reg.write_binary(TEST_KEY, "b", &[9, 8, 7]).unwrap();

    let mut seen = Vec::new();
    reg.enum_all_values(TEST_KEY, |item| {
        seen.push((item.name.to_string(), item.value_type, item.decode()?));
        Ok(())
    })
    .unwrap();
    assert_eq!(
        seen,
        vec![
            ("s".to_string(), ValueType::String, ValueData::String("text".into())),
            ("d".to_string(), ValueType::Dword, ValueData::Dword(7)),
            ("q".to_string(), ValueType::Qword, ValueData::Qword(1 << 40)),
            (
                "m".to_string(),
                ValueType::MultiString,
                ValueData::MultiString(vec!["a".into(), "b".into()])
            ),
            ("b".to_string(), ValueType::Binary, ValueData::Binary(vec![9, 8, 7])),
        ]
    );

    let map = reg.read_all_values_into_map(TEST_KEY).unwrap();
    assert_eq!(map.len(), 5);
    assert_eq!(map["s"].value.as_str(), Some("text"));
    assert_eq!(map["d"].value.as_dword(), Some(7));
    assert_eq!(map["q"].value.as_qword(), Some(1 << 40));
    assert_eq!(map["m"].value.as_multi_string().map(<[String]>::len), Some(2));
    assert_eq!(map["b"].value.as_binary(), Some(&[9u8, 8, 7][..]));
    assert_eq!(map["b"].value_type, ValueType::Binary);
}

#[test]
fn test_unsupported_types_map_to_unhandled() {
    let reg = setup();
    reg.write_value_base(TEST_KEY, "link", ValueType::Link, &[1, 2]).unwrap();
    let map = reg.read_all_values_into_map(TEST_KEY).unwrap();
    assert_eq!(
        map["link"].value,
        ValueData::Unhandled {
            value_type: ValueType::Link,
            data: vec![1, 2]
        }
    );
}

#[test]
fn test_callback_error_stops_enumeration() {
    let reg = setup();
    for i in 0..5 {
        reg.write_dword(TEST_KEY, &format!("v{}", i), i).unwrap();
    }

    let mut visited = 0;
    let err = reg
        .enum_all_values(TEST_KEY, |item| {
            visited += 1;
            if item.index == 2 {
                return Err(RegistryError::Callback("stop".into()));
            }
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err, RegistryError::Callback("stop".into()));
    assert_eq!(visited, 3);

    reg.ensure_key_exists("SOFTWARE\\reg-access-test\\Child").unwrap();
    let err = reg
        .enum_all_subkeys(TEST_KEY, |_| Err(RegistryError::InvalidPath("child".into())))
        .unwrap_err();
    assert_eq!(err, RegistryError::InvalidPath("child".into()));
}

#[test]
fn test_value_growing_during_enumeration_fails() {
    let reg = setup();
    reg.write_dword(TEST_KEY, "a", 1).unwrap();
    reg.write_dword(TEST_KEY, "b", 2).unwrap();

    let writer = RegistryAccess::new(reg.root().clone());
    let mut seen = Vec::new();
    let err = reg
        .enum_all_values(TEST_KEY, |item| {
            seen.push(item.name.to_string());
            if item.index == 0 {
                writer.write_binary(TEST_KEY, "b", &[0xab; 64])?;
            }
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err, RegistryError::Os { code: 234 });
    assert_eq!(seen, vec!["a"]);
}

#[test]
fn test_subkey_enumeration() {
    let reg = setup();
    reg.ensure_key_exists("SOFTWARE\\reg-access-test\\zeta").unwrap();
    reg.ensure_key_exists("SOFTWARE\\reg-access-test\\Alpha\\Deep").unwrap();
    reg.root().set_class("SOFTWARE\\reg-access-test\\zeta", "Z").unwrap();

    assert_eq!(reg.read_all_subkeys_into_vec(TEST_KEY).unwrap(), vec!["Alpha", "zeta"]);

    let mut classes = Vec::new();
    reg.enum_all_subkeys(TEST_KEY, |item| {
        assert!(item.last_write_time.is_some());
        classes.push((item.index, item.class.to_string()));
        Ok(())
    })
    .unwrap();
    assert_eq!(classes, vec![(0, String::new()), (1, "Z".to_string())]);
}

#[test]
fn test_large_string_grows_buffer() {
    let reg = setup();
    let long: String = "0123456789".repeat(300);
    reg.write_string(TEST_KEY, "long", &long).unwrap();

    assert_eq!(reg.read_value_info(TEST_KEY, "long").unwrap(), (ValueType::String, (3000 + 1) * 2));
    assert_eq!(reg.read_string(TEST_KEY, "long").unwrap(), long);
}

#[test]
fn test_single_attempt_budget_cannot_grow() {
    init_tracing();
    let config = AccessConfig {
        max_read_attempts: 1,
        ..AccessConfig::default()
    };
    let reg = RegistryAccess::with_config(MemoryRegistry::new(), config);
    reg.ensure_key_exists(TEST_KEY).unwrap();
    reg.write_binary(TEST_KEY, "big", &[0u8; 2048]).unwrap();
    reg.write_binary(TEST_KEY, "small", &[0u8; 16]).unwrap();

    assert_eq!(
        reg.read_binary(TEST_KEY, "big").unwrap_err(),
        RegistryError::RetriesExhausted { attempts: 1 }
    );
    assert_eq!(reg.read_binary(TEST_KEY, "small").unwrap().len(), 16);
}

#[test]
fn test_multi_string_preserves_count_and_order() {
    let reg = setup();
    let list = vec!["z".to_string(), "a".to_string(), "m m".to_string(), "\u{e9}".to_string()];
    reg.write_multi_string(TEST_KEY, "list", list.as_slice()).unwrap();
    assert_eq!(reg.read_multi_string(TEST_KEY, "list").unwrap(), list);

    reg.write_multi_string::<&str>(TEST_KEY, "empty", &[]).unwrap();
    assert!(reg.read_multi_string(TEST_KEY, "empty").unwrap().is_empty());
}

#[test]
fn test_type_mismatch_is_rejected() {
    let reg = setup();
    reg.write_string(TEST_KEY, "s", "1234").unwrap();
    reg.write_dword(TEST_KEY, "d", 1234).unwrap();

    let err = reg.read_dword(TEST_KEY, "s").unwrap_err();
    assert_eq!(
        err,
        RegistryError::TypeMismatch {
            expected: ValueType::Dword,
            found: ValueType::String
        }
    );
    assert!(reg.read_string(TEST_KEY, "d").unwrap_err().is_type_mismatch());
    assert!(reg.read_qword(TEST_KEY, "d").unwrap_err().is_type_mismatch());
    assert!(reg.read_multi_string(TEST_KEY, "s").unwrap_err().is_type_mismatch());
    assert!(reg.read_binary(TEST_KEY, "d").unwrap_err().is_type_mismatch());
}

#[test]
fn test_obfuscated_reads() {
    let reg = setup();
    reg.write_string(TEST_KEY, "Secret", "s3cr3t").unwrap();
    reg.write_dword(TEST_KEY, "Other", 2).unwrap();
    reg.write_qword(TEST_KEY, "Third", 3).unwrap();

    let entry = reg.read_value_obfuscated(TEST_KEY, "secret").unwrap();
    assert_eq!(entry.name, "Secret");
    assert_eq!(entry.value, ValueData::String("s3cr3t".into()));
    assert!(reg.read_value_obfuscated(TEST_KEY, "nope").unwrap_err().is_not_found());

    let entries = reg
        .read_values_obfuscated(TEST_KEY, &["third", "missing", "SECRET"])
        .unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Third", "Secret"]);
}

#[test]
fn test_value_names_are_case_insensitive() {
    let reg = setup();
    reg.write_dword(TEST_KEY, "Counter", 1).unwrap();
    reg.write_dword(TEST_KEY, "COUNTER", 2).unwrap();
    assert_eq!(reg.read_dword(TEST_KEY, "counter").unwrap(), 2);
    assert_eq!(reg.read_all_values_into_map(TEST_KEY).unwrap().len(), 1);
}

#[test]
fn test_default_value_uses_empty_name() {
    let reg = setup();
    reg.write_string(TEST_KEY, "", "default").unwrap();
    assert_eq!(reg.read_string(TEST_KEY, "").unwrap(), "default");
}

#[test]
#[cfg(target_pointer_width = "64")]
fn test_wow64_views_are_separate() {
    init_tracing();
    let store = MemoryRegistry::new();
    let mut reg32 = RegistryAccess::new(store.clone());
    reg32.set_wow64_key_access(Wow64KeyAccess::Force32);
    let reg64 = RegistryAccess::with_config(
        store.clone(),
        AccessConfig::default().with_wow64(Wow64KeyAccess::Force64),
    );
    let native = RegistryAccess::new(store);

    reg32.ensure_key_exists(TEST_KEY).unwrap();
    reg32.write_dword(TEST_KEY, "bits", 32).unwrap();
    reg64.ensure_key_exists(TEST_KEY).unwrap();
    reg64.write_dword(TEST_KEY, "bits", 64).unwrap();

    assert_eq!(reg32.read_dword(TEST_KEY, "bits").unwrap(), 32);
    assert_eq!(reg64.read_dword(TEST_KEY, "bits").unwrap(), 64);
    assert_eq!(native.read_dword(TEST_KEY, "bits").unwrap(), 64);
    assert_eq!(
        native
            .read_dword("SOFTWARE\\WOW6432Node\\reg-access-test", "bits")
            .unwrap(),
        32
    );
}

#[test]
#[cfg(target_pointer_width = "64")]
fn test_open_key_combines_view_bits() {
    let mut reg = setup();
    reg.set_wow64_key_access(Wow64KeyAccess::Force64);
    let key = reg.open_key(TEST_KEY, KeyAccess::READ).unwrap();
    assert!(key.query_info().is_ok());
    // Read access does not grant writes.
    assert_eq!(
        key.set_value("v", Charset::Wide, ValueType::Dword, &[0; 4])
            .unwrap_err()
            .os_code(),
        Some(5)
    );
}

/// A root whose single value grows on every query.
struct GrowingRoot;

struct GrowingKey {
    calls: Cell<usize>,
}

impl RegistryRoot for GrowingRoot {
    type Key = GrowingKey;

    fn open_key(&self, _path: &str, _access: KeyAccess) -> Result<GrowingKey> {
        Ok(GrowingKey { calls: Cell::new(0) })
    }

    fn create_key(&self, _path: &str, _access: KeyAccess) -> Result<(GrowingKey, Disposition)> {
        Ok((GrowingKey { calls: Cell::new(0) }, Disposition::Other(7)))
    }

    fn delete_key(&self, _path: &str, _access: KeyAccess) -> Result<()> {
        Ok(())
    }
}

impl RegistryKey for GrowingKey {
    fn query_value(&self, _name: &str, _charset: Charset, buf: &mut [u8]) -> Result<QueryOutcome> {
        self.calls.set(self.calls.get() + 1);
        Ok(QueryOutcome::MoreData {
            value_type: ValueType::Binary,
            required: buf.len() + 1,
        })
    }

    fn set_value(
        &self,
        _name: &str,
        _charset: Charset,
        _value_type: ValueType,
        _data: &[u8],
    ) -> Result<()> {
        Ok(())
    }

    fn delete_value(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn query_info(&self) -> Result<KeyInfo> {
        Ok(KeyInfo {
            subkey_count: 0,
            max_subkey_name_len: 0,
            max_class_len: 0,
            value_count: 1,
            max_value_name_len: 1,
            max_value_data_len: 0,
            last_write_time: None,
        })
    }

    fn enum_value(
        &self,
        index: u32,
        name: &mut String,
        data: &mut [u8],
    ) -> Result<Option<EnumValueOutcome>> {
        if index > 0 {
            return Ok(None);
        }
        name.clear();
        name.push('v');
        Ok(Some(EnumValueOutcome {
            value_type: ValueType::Binary,
            data_len: data.len() + 8,
        }))
    }

    fn enum_key(
        &self,
        _index: u32,
        _name: &mut String,
        _class: &mut String,
    ) -> Result<Option<EnumKeyOutcome>> {
        Ok(None)
    }
}

#[test]
fn test_ever_growing_value_exhausts_retries() {
    let reg = RegistryAccess::new(GrowingRoot);
    let err = reg.read_value_base("any", "v").unwrap_err();
    assert_eq!(err, RegistryError::RetriesExhausted { attempts: 2 });
}

#[test]
fn test_impossible_disposition_is_reported() {
    let reg = RegistryAccess::new(GrowingRoot);
    assert_eq!(
        reg.ensure_key_exists("any").unwrap_err(),
        RegistryError::UnexpectedDisposition(7)
    );
}

#[test]
fn test_enumerated_size_past_buffer_is_more_data() {
    let reg = RegistryAccess::new(GrowingRoot);
    let mut visited = 0;
    let err = reg
        .enum_all_values("any", |_| {
            visited += 1;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err.os_code(), Some(234));
    assert_eq!(visited, 0);
}
