//! Centralized install path conventions.
//!
//! This module is the single source of truth for where a package lands on
//! disk. Other modules should use these functions rather than joining paths
//! directly.

use std::path::{Component, Path, PathBuf};

use super::core::Package;

/// Resolve the root directory a package is installed into.
///
/// The package's own `root_directory` wins over the configured distribution
/// root. When `package_folder` is set, the package name is appended.
///
/// # Examples
///
/// ```
/// use std::path::{Component, Path, PathBuf};
/// use pkgsync::package::{package_root_path, Package};
/// use uuid::Uuid;
///
/// let plain = Package::new(Uuid::new_v4(), "Firmware", 1);
/// assert_eq!(package_root_path(Path::new("/dist"), &plain), PathBuf::from("/dist"));
///
/// let nested = Package::new(Uuid::new_v4(), "Firmware", 1).with_package_folder(true);
/// assert_eq!(package_root_path(Path::new("/dist"), &nested), PathBuf::from("/dist/Firmware"));
///
/// let custom = Package::new(Uuid::new_v4(), "Firmware", 1).with_root_directory("/custom");
/// assert_eq!(package_root_path(Path::new("/dist"), &custom), PathBuf::from("/custom"));
/// ```
pub fn package_root_path(distribution_root: &Path, package: &Package) -> PathBuf {
    let base = match &package.root_directory {
        Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
        _ => distribution_root.to_path_buf(),
    };

    if package.package_folder {
        base.join(&package.name)
    } else {
        base
    }
}

/// Whether `name` is exactly one normal path segment.
///
/// Folder and file names from a manifest are joined below the package root,
/// so `..`, `.`, empty names, absolute paths and names containing a path
/// separator (either `/` or `\`) are rejected on every platform.
///
/// # Examples
///
/// ```
/// use pkgsync::package::is_plain_name;
///
/// assert!(is_plain_name("Drivers"));
/// assert!(is_plain_name("setup.v2.exe"));
/// assert!(!is_plain_name(".."));
/// assert!(!is_plain_name("a/b"));
/// assert!(!is_plain_name("/etc"));
/// ```
pub fn is_plain_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Whether every component of `path` is a normal segment.
pub(crate) fn is_contained_path(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_empty_root_directory_falls_back() {
        let package = Package::new(Uuid::new_v4(), "Tools", 1).with_root_directory("");
        assert_eq!(
            package_root_path(Path::new("/dist"), &package),
            PathBuf::from("/dist")
        );
    }

    #[test]
    fn test_custom_root_with_package_folder() {
        let package = Package::new(Uuid::new_v4(), "Tools", 1)
            .with_root_directory("/srv")
            .with_package_folder(true);
        assert_eq!(
            package_root_path(Path::new("/dist"), &package),
            PathBuf::from("/srv/Tools")
        );
    }

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("bin"));
        assert!(is_plain_name("..hidden"));
        assert!(is_plain_name("name with spaces"));

        assert!(!is_plain_name(""));
        assert!(!is_plain_name("."));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("a\\b"));
        assert!(!is_plain_name("/etc"));
        assert!(!is_plain_name("../precious"));
    }

    #[test]
    fn test_contained_paths() {
        assert!(is_contained_path(Path::new("bin/run.sh")));
        assert!(!is_contained_path(Path::new("")));
        assert!(!is_contained_path(Path::new("../run.sh")));
        assert!(!is_contained_path(Path::new("/etc/passwd")));
        assert!(!is_contained_path(Path::new("bin/../../run.sh")));
    }
}
