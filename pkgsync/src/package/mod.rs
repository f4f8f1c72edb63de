//! Package manifest types.
//!
//! This module provides the value types describing a deployable package and
//! the record kept for it once installed.
//!
//! # Overview
//!
//! - **Package**: versioned, prioritized bundle with a folder tree
//! - **PackageFolder / PackageFile**: the tree itself; folders are matched by name
//! - **FileAttributes**: per-file overwrite and execution flags
//! - **InstalledPackageRecord**: what the registry persists after an install
//!
//! # Type Hierarchy
//!
//! ```text
//! Package                           InstalledPackageRecord
//! ├── id, name, version, priority   ├── package_id, name, version, installed
//! └── folders: [PackageFolder]      ├── root_path
//!       ├── files: [PackageFile]    ├── folders: [PackageFolder]  ←── snapshot
//!       └── folders: [...]          └── files: [InstalledFile]
//! ```

mod attributes;
mod core;
mod installed;
mod naming;

pub use attributes::FileAttributes;
pub use self::core::{InvalidName, Package, PackageFile, PackageFolder};
pub use installed::{InstalledFile, InstalledPackageRecord};
pub use naming::{is_plain_name, package_root_path};
