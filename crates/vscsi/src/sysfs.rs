// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Helper functions for interacting with Linux sysfs interfaces

use std::{fs, path::Path, str::FromStr};

/// Reads a value from a sysfs node and attempts to parse it to type T
///
/// # Arguments
///
/// * `node` - Path to the sysfs node
/// * `key` - Name of the sysfs attribute to read
///
/// # Returns
///
/// * `Some(T)` if the value was successfully read and parsed
/// * `None` if the file could not be read or parsed
pub(crate) fn read<T>(node: &Path, key: &str) -> Option<T>
where
    T: FromStr,
{
    let path = node.join(key);
    fs::read_to_string(&path).ok()?.trim().parse().ok()
}

/// Lists the entry names directly below `dir`, sorted.
///
/// An unreadable directory yields an empty list.
pub(crate) fn entries(dir: &Path) -> Vec<String> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<_> = read_dir
        .filter_map(Result::ok)
        .filter_map(|e| Some(e.file_name().to_str()?.to_owned()))
        .collect();
    names.sort();
    names
}

/// Returns the first entry below `dir` whose name starts with `prefix`.
pub(crate) fn first_entry(dir: &Path, prefix: &str) -> Option<String> {
    entries(dir).into_iter().find(|name| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn fixture(rel: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/vmware").join(rel)
    }

    #[test]
    fn test_read_trims() {
        let node = fixture("sys/bus/scsi/devices/2:0:0:0");
        let vendor: String = read(&node, "vendor").unwrap();
        assert_eq!(vendor, "VMware");
        assert_eq!(read::<u64>(&node, "block/sdb/size"), Some(20971520));
        assert_eq!(read::<u64>(&node, "nonexistent"), None);
    }

    #[test]
    fn test_first_entry() {
        let node = fixture("sys/bus/pci/devices/0000:03:00.0");
        assert_eq!(first_entry(&node, "host").as_deref(), Some("host2"));
        assert_eq!(first_entry(&node, "nothing"), None);
        assert!(entries(&fixture("does/not/exist")).is_empty());
    }
}
