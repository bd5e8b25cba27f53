//! Error types for registry access operations.
//!
//! OS status codes surface through [`RegistryError::Os`], except for the
//! "file not found" code which gets its own variant because nearly every
//! caller wants to treat a missing key or value as an expected outcome.

use crate::value_type::ValueType;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// `ERROR_FILE_NOT_FOUND`
pub const ERROR_FILE_NOT_FOUND: u32 = 2;
/// `ERROR_ACCESS_DENIED`
pub const ERROR_ACCESS_DENIED: u32 = 5;
/// `ERROR_INVALID_PARAMETER`
pub const ERROR_INVALID_PARAMETER: u32 = 87;
/// `ERROR_MORE_DATA`
pub const ERROR_MORE_DATA: u32 = 234;
/// `ERROR_NO_MORE_ITEMS`
pub const ERROR_NO_MORE_ITEMS: u32 = 259;
/// `ERROR_KEY_DELETED`
pub const ERROR_KEY_DELETED: u32 = 1018;

/// Errors that can occur while reading or writing the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Key or value does not exist (`ERROR_FILE_NOT_FOUND`).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other OS status code.
    #[error("OS error {code} ({code:#x})")]
    Os {
        /// Raw Win32 error code.
        code: u32,
    },

    /// The stored type tag does not match the requested native shape.
    #[error("Unexpected value type: expected {}, found {}", expected.name(), found.name())]
    TypeMismatch {
        /// Type the conversion accepts.
        expected: ValueType,
        /// Type actually stored.
        found: ValueType,
    },

    /// Payload size is inconsistent with its type tag.
    #[error(
        "Invalid payload for {}: expected {expected} bytes, got {actual} bytes",
        value_type.name()
    )]
    SizeMismatch {
        /// Type tag of the payload.
        value_type: ValueType,
        /// Size the type requires.
        expected: usize,
        /// Size actually present.
        actual: usize,
    },

    /// String data could not be decoded or encoded in the requested charset.
    #[error("Invalid string data: {0}")]
    InvalidString(String),

    /// The value kept growing faster than the read loop could follow.
    #[error("Value read gave up after {attempts} attempts")]
    RetriesExhausted {
        /// Number of query calls made.
        attempts: usize,
    },

    /// Safe-delete guard refused the target path.
    #[error("Refusing to delete '{path}': not under a safe-delete path")]
    SafeDeleteRefused {
        /// Key path that was refused.
        path: String,
    },

    /// Create-or-open reported a disposition other than created/opened.
    #[error("Unexpected key disposition: {0}")]
    UnexpectedDisposition(u32),

    /// Key path is unusable for the requested operation.
    #[error("Invalid key path: {0:?}")]
    InvalidPath(String),

    /// Failure raised by an enumeration callback.
    #[error("Enumeration callback failed: {0}")]
    Callback(String),
}

impl RegistryError {
    /// Creates a not found error with context about what was being searched.
    ///
    /// # Arguments
    ///
    /// * `item_type` - Type of item (e.g., "key", "value")
    /// * `name` - Name of the item that wasn't found
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_access::error::RegistryError;
    /// let err = RegistryError::not_found("value", "DisplayName");
    /// assert!(err.is_not_found());
    /// ```
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{} '{}'", item_type, name))
    }

    /// Wraps a raw OS status code.
    ///
    /// `ERROR_FILE_NOT_FOUND` becomes [`RegistryError::NotFound`] so that
    /// callers only ever have to match one variant for absence.
    pub fn os(code: u32) -> Self {
        match code {
            ERROR_FILE_NOT_FOUND => Self::NotFound(String::from("file")),
            code => Self::Os { code },
        }
    }

    /// Same as [`RegistryError::os`] but names the missing item.
    pub fn os_with_context(code: u32, item_type: &str, name: &str) -> Self {
        match code {
            ERROR_FILE_NOT_FOUND => Self::not_found(item_type, name),
            code => Self::Os { code },
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: ValueType, found: ValueType) -> Self {
        Self::TypeMismatch { expected, found }
    }

    /// Creates a size mismatch error.
    pub fn size_mismatch(value_type: ValueType, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            value_type,
            expected,
            actual,
        }
    }

    /// Returns true if this is the "does not exist" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a type mismatch.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    /// Returns the OS status code behind this error, if it came from the OS.
    pub fn os_code(&self) -> Option<u32> {
        match self {
            Self::NotFound(_) => Some(ERROR_FILE_NOT_FOUND),
            Self::Os { code } => Some(*code),
            _ => None,
        }
    }
}
