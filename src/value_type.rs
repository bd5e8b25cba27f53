//! Registry value type tags.
//!
//! The OS stores a 32-bit type tag next to every value's raw bytes. The tag
//! alone decides how the payload must be interpreted.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Registry value data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variables.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit integer in native byte order.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Full resource descriptor.
    FullResourceDescriptor,

    /// Resource requirements list.
    ResourceRequirementsList,

    /// 64-bit integer in native byte order.
    Qword,

    /// Non-standard value type.
    /// Contains the raw type value.
    Unknown(u32),
}

impl ValueType {
    /// Parses a value type from its OS tag.
    ///
    /// Types 0-11 are predefined, but any other tag is legal in the registry
    /// and comes back as `ValueType::Unknown`.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            _ => ValueType::Unknown(value),
        }
    }

    /// Returns the OS tag for this type.
    pub fn as_u32(&self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
            ValueType::Unknown(value) => *value,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            ValueType::None => "REG_NONE".to_string(),
            ValueType::String => "REG_SZ".to_string(),
            ValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            ValueType::Binary => "REG_BINARY".to_string(),
            ValueType::Dword => "REG_DWORD".to_string(),
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN".to_string(),
            ValueType::Link => "REG_LINK".to_string(),
            ValueType::MultiString => "REG_MULTI_SZ".to_string(),
            ValueType::ResourceList => "REG_RESOURCE_LIST".to_string(),
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR".to_string(),
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST".to_string(),
            ValueType::Qword => "REG_QWORD".to_string(),
            ValueType::Unknown(value) => format!("REG_UNKNOWN_{:#010x}", value),
        }
    }

    /// Returns true for the two plain string types.
    pub fn is_string(&self) -> bool {
        matches!(self, ValueType::String | ValueType::ExpandString)
    }

    /// Returns true for types whose payload is character data, which the
    /// narrow API variants convert between code pages.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            ValueType::String | ValueType::ExpandString | ValueType::MultiString
        )
    }
}

impl From<u32> for ValueType {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl From<ValueType> for u32 {
    fn from(value: ValueType) -> Self {
        value.as_u32()
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type() {
        assert_eq!(ValueType::from_u32(1), ValueType::String);
        assert_eq!(ValueType::from_u32(4), ValueType::Dword);
        assert_eq!(ValueType::String.name(), "REG_SZ");
    }

    #[test]
    fn test_unknown_tag_is_preserved() {
        let ty = ValueType::from_u32(0x4242);
        assert_eq!(ty, ValueType::Unknown(0x4242));
        assert_eq!(ty.as_u32(), 0x4242);
        assert_eq!(ty.name(), "REG_UNKNOWN_0x00004242");
    }

    #[test]
    fn test_tags_map_back() {
        for tag in 0..=11u32 {
            assert_eq!(ValueType::from_u32(tag).as_u32(), tag);
        }
    }

    #[test]
    fn test_text_types() {
        assert!(ValueType::ExpandString.is_string());
        assert!(!ValueType::MultiString.is_string());
        assert!(ValueType::MultiString.is_text());
        assert!(!ValueType::Binary.is_text());
    }
}
