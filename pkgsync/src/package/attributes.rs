//! Per-file policy flags.
//!
//! The wire format is a plain integer bitmask. Flags are independent, so a
//! file may carry several at once (for example `EXECUTE_ALWAYS | TOP_LEVEL_FILE`).

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Combinable file attribute flags.
///
/// # Example
///
/// ```
/// use pkgsync::package::FileAttributes;
///
/// let attrs = FileAttributes::EXECUTE_ALWAYS | FileAttributes::TOP_LEVEL_FILE;
///
/// assert!(attrs.contains(FileAttributes::TOP_LEVEL_FILE));
/// assert!(!attrs.contains(FileAttributes::OVERWRITE_NEVER));
/// assert_eq!(attrs.bits(), 6);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileAttributes(u32);

impl FileAttributes {
    /// Execute after this run downloaded the file.
    pub const EXECUTE_ONCE: Self = Self(1);
    /// Execute after every install.
    pub const EXECUTE_ALWAYS: Self = Self(2);
    /// Entry point for later execution.
    pub const TOP_LEVEL_FILE: Self = Self(4);
    /// Never overwrite a file that exists locally.
    pub const OVERWRITE_NEVER: Self = Self(8);
    /// Overwrite an existing file only on a package version upgrade.
    pub const OVERWRITE_ON_NEW_PACKAGE_VERSION: Self = Self(16);
    /// Execute when freshly downloaded or on a package version upgrade.
    pub const EXECUTE_ONCE_PER_VERSION: Self = Self(32);

    const NAMED: [(Self, &'static str); 6] = [
        (Self::EXECUTE_ONCE, "ExecuteOnce"),
        (Self::EXECUTE_ALWAYS, "ExecuteAlways"),
        (Self::TOP_LEVEL_FILE, "TopLevelFile"),
        (Self::OVERWRITE_NEVER, "OverwriteNever"),
        (
            Self::OVERWRITE_ON_NEW_PACKAGE_VERSION,
            "OverwriteOnNewPackageVersion",
        ),
        (Self::EXECUTE_ONCE_PER_VERSION, "ExecuteOncePerVersion"),
    ];

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw bits. Unknown bits are kept.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bit value.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Whether no flags are set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FileAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FileAttributes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "None");
        }

        let mut first = true;
        let mut known = 0;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                first = false;
                known |= flag.0;
            }
        }

        let unknown = self.0 & !known;
        if unknown != 0 {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{:#x}", unknown)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(FileAttributes::EXECUTE_ONCE.bits(), 1);
        assert_eq!(FileAttributes::EXECUTE_ALWAYS.bits(), 2);
        assert_eq!(FileAttributes::TOP_LEVEL_FILE.bits(), 4);
        assert_eq!(FileAttributes::OVERWRITE_NEVER.bits(), 8);
        assert_eq!(FileAttributes::OVERWRITE_ON_NEW_PACKAGE_VERSION.bits(), 16);
        assert_eq!(FileAttributes::EXECUTE_ONCE_PER_VERSION.bits(), 32);
    }

    #[test]
    fn test_contains_is_bitwise() {
        let attrs = FileAttributes::from_bits(8 | 4);
        assert!(attrs.contains(FileAttributes::OVERWRITE_NEVER));
        assert!(attrs.contains(FileAttributes::TOP_LEVEL_FILE));
        assert!(!attrs.contains(FileAttributes::EXECUTE_ONCE));
        assert!(attrs.contains(FileAttributes::empty()));
    }

    #[test]
    fn test_serde_is_integer() {
        let attrs = FileAttributes::EXECUTE_ALWAYS | FileAttributes::TOP_LEVEL_FILE;
        assert_eq!(serde_json::to_string(&attrs).unwrap(), "6");

        let parsed: FileAttributes = serde_json::from_str("40").unwrap();
        assert!(parsed.contains(FileAttributes::OVERWRITE_NEVER));
        assert!(parsed.contains(FileAttributes::EXECUTE_ONCE_PER_VERSION));
    }

    #[test]
    fn test_display() {
        assert_eq!(FileAttributes::empty().to_string(), "None");
        assert_eq!(
            (FileAttributes::EXECUTE_ALWAYS | FileAttributes::TOP_LEVEL_FILE).to_string(),
            "ExecuteAlways | TopLevelFile"
        );
        assert_eq!(FileAttributes::from_bits(64 | 1).to_string(), "ExecuteOnce | 0x40");
    }
}
