//! Key access rights and WOW64 registry view selection.

use bitflags::bitflags;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Registry key access rights (`REGSAM`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct KeyAccess: u32 {
        /// Read values.
        const QUERY_VALUE        = 0x0001;
        /// Create, change or delete values.
        const SET_VALUE          = 0x0002;
        /// Create subkeys.
        const CREATE_SUB_KEY     = 0x0004;
        /// Enumerate subkeys.
        const ENUMERATE_SUB_KEYS = 0x0008;
        /// Request change notifications.
        const NOTIFY             = 0x0010;
        /// Reserved by the OS.
        const CREATE_LINK        = 0x0020;
        /// Use the 64-bit registry view.
        const WOW64_64KEY        = 0x0100;
        /// Use the 32-bit registry view.
        const WOW64_32KEY        = 0x0200;
        /// Delete the key.
        const DELETE             = 0x0001_0000;
        /// Read the security descriptor.
        const READ_CONTROL       = 0x0002_0000;
        /// Change the DACL.
        const WRITE_DAC          = 0x0004_0000;
        /// Change the owner.
        const WRITE_OWNER        = 0x0008_0000;

        /// `KEY_READ`
        const READ  = Self::READ_CONTROL.bits()
            | Self::QUERY_VALUE.bits()
            | Self::ENUMERATE_SUB_KEYS.bits()
            | Self::NOTIFY.bits();
        /// `KEY_WRITE`
        const WRITE = Self::READ_CONTROL.bits()
            | Self::SET_VALUE.bits()
            | Self::CREATE_SUB_KEY.bits();
        /// `KEY_ALL_ACCESS`
        const ALL_ACCESS = 0x000F_003F;
    }
}

impl KeyAccess {
    /// The two view-selection bits.
    pub const VIEW_MASK: KeyAccess = KeyAccess::WOW64_32KEY.union(KeyAccess::WOW64_64KEY);

    /// Returns only the view-selection bits.
    pub fn view(&self) -> KeyAccess {
        self.intersection(Self::VIEW_MASK)
    }

    /// Returns the rights without the view-selection bits.
    pub fn rights(&self) -> KeyAccess {
        self.difference(Self::VIEW_MASK)
    }

    /// Raw `REGSAM` value.
    pub fn as_u32(&self) -> u32 {
        self.bits()
    }
}

/// Which registry view an accessor consults on a 64-bit OS, where 32-bit
/// applications see a redirected copy of parts of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Wow64KeyAccess {
    /// Let the OS pick the view of the running process.
    #[default]
    Default,
    /// Always use the 32-bit view.
    Force32,
    /// Always use the 64-bit view.
    Force64,
    /// Ask explicitly for the view matching this process's bitness.
    MatchProcess,
}

impl Wow64KeyAccess {
    /// Access-mask modifier added to every open and create call.
    pub fn access_flags(&self) -> KeyAccess {
        match self {
            Wow64KeyAccess::Default => KeyAccess::empty(),
            Wow64KeyAccess::Force32 => KeyAccess::WOW64_32KEY,
            Wow64KeyAccess::Force64 => KeyAccess::WOW64_64KEY,
            Wow64KeyAccess::MatchProcess => {
                if cfg!(target_pointer_width = "64") {
                    KeyAccess::WOW64_64KEY
                } else {
                    KeyAccess::WOW64_32KEY
                }
            }
        }
    }
}

impl fmt::Display for Wow64KeyAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Wow64KeyAccess::Default => "default",
            Wow64KeyAccess::Force32 => "32",
            Wow64KeyAccess::Force64 => "64",
            Wow64KeyAccess::MatchProcess => "native",
        })
    }
}

impl FromStr for Wow64KeyAccess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Wow64KeyAccess::Default),
            "32" | "32bit" | "force32" => Ok(Wow64KeyAccess::Force32),
            "64" | "64bit" | "force64" => Ok(Wow64KeyAccess::Force64),
            "native" | "process" => Ok(Wow64KeyAccess::MatchProcess),
            other => Err(format!("unknown WOW64 key access option: {}", other)),
        }
    }
}
