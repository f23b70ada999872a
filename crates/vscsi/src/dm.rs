// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Device-mapper topology
//!
//! Parses `dmsetup info -c --noheadings --separator ';' -o name,uuid,minor,blkdevs_used`
//! and answers which multipath map and LVM volume group sit on top of a
//! given SCSI block device.

use std::collections::HashSet;

use log::debug;

/// Maximum number of stacked maps followed from a block device upwards.
const MAX_DEPTH: usize = 8;

/// A single device-mapper device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmDevice {
    /// Map name, e.g. `vg_data-lv_u01` or `mpatha`
    pub name: String,
    /// Subsystem-prefixed uuid, e.g. `LVM-...` or `mpath-...`
    pub uuid: String,
    /// Minor number, giving the kernel name `dm-<minor>`
    pub minor: u32,
    /// Names of the block devices this map is built on
    pub deps: Vec<String>,
}

impl DmDevice {
    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().split(';');
        let name = fields.next()?.trim();
        let uuid = fields.next()?.trim();
        let minor = fields.next()?.trim().parse().ok()?;
        let deps = fields
            .next()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| d.trim_start_matches("/dev/").to_owned())
            .collect();

        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_owned(),
            uuid: uuid.to_owned(),
            minor,
            deps,
        })
    }

    /// Kernel name of the map, `dm-<minor>`.
    pub fn kernel_name(&self) -> String {
        format!("dm-{}", self.minor)
    }

    pub fn is_lvm(&self) -> bool {
        self.uuid.starts_with("LVM-")
    }

    pub fn is_multipath(&self) -> bool {
        self.uuid.starts_with("mpath-")
    }

    /// Whether `device` (or a partition of it) is directly used by this map.
    fn uses(&self, device: &str) -> bool {
        self.deps.iter().any(|dep| is_same_or_partition(dep, device))
    }

    /// Volume group name decoded from an LVM map name.
    ///
    /// LVM escapes `-` inside names as `--`; the first single `-` separates
    /// the volume group from the logical volume.
    pub fn volume_group(&self) -> Option<String> {
        if !self.is_lvm() {
            return None;
        }

        let mut vg = String::new();
        let mut chars = self.name.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '-' {
                if chars.peek() == Some(&'-') {
                    chars.next();
                    vg.push('-');
                } else {
                    return Some(vg);
                }
            } else {
                vg.push(c);
            }
        }

        None
    }
}

/// `dep` names `device` itself or one of its partitions (`sdc1`, `dm-3p1`).
fn is_same_or_partition(dep: &str, device: &str) -> bool {
    let Some(rest) = dep.strip_prefix(device) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }

    // Names ending in a digit separate the partition number with 'p'
    let number = if device.ends_with(|c: char| c.is_ascii_digit()) {
        match rest.strip_prefix('p') {
            Some(number) => number,
            None => return false,
        }
    } else {
        rest
    };

    !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
}

/// Storage stack facts for one block device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    /// Multipath map the device is a path of
    pub multipath: Option<String>,
    /// Volume group at the top of the stack
    pub volume_group: Option<String>,
}

/// The device-mapper table of a host.
#[derive(Debug, Clone, Default)]
pub struct DmTable {
    devices: Vec<DmDevice>,
}

impl DmTable {
    /// Parses `dmsetup info -c` output. "No devices found" and malformed
    /// lines yield no entries.
    pub fn parse(text: &str) -> Self {
        Self {
            devices: text.lines().filter_map(DmDevice::parse).collect(),
        }
    }

    pub fn devices(&self) -> &[DmDevice] {
        &self.devices
    }

    /// Walks the maps stacked on `block` until an LVM volume is found.
    pub fn membership(&self, block: &str) -> Membership {
        let mut membership = Membership::default();
        let mut seen = HashSet::new();
        let mut frontier: Vec<&DmDevice> = self.devices.iter().filter(|d| d.uses(block)).collect();

        for _ in 0..MAX_DEPTH {
            if frontier.is_empty() {
                break;
            }

            let mut next = Vec::new();
            for device in frontier {
                if !seen.insert(device.name.as_str()) {
                    continue;
                }

                if device.is_multipath() && membership.multipath.is_none() {
                    membership.multipath = Some(device.name.clone());
                }

                if let Some(vg) = device.volume_group() {
                    debug!("{block} belongs to volume group {vg} via {}", device.name);
                    membership.volume_group = Some(vg);
                    return membership;
                }

                let kernel_name = device.kernel_name();
                next.extend(
                    self.devices
                        .iter()
                        .filter(|d| d.uses(&device.name) || d.uses(&kernel_name)),
                );
            }
            frontier = next;
        }

        membership
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = include_str!("../tests/fixtures/dmsetup-info.txt");

    #[test]
    fn test_parse() {
        let table = DmTable::parse(TABLE);
        assert_eq!(table.devices().len(), 6);
        let mpath = &table.devices()[2];
        assert_eq!(mpath.name, "mpatha");
        assert_eq!(mpath.deps, ["sdc"]);
        assert!(mpath.is_multipath());
    }

    #[test]
    fn test_no_devices() {
        assert!(DmTable::parse("No devices found\n").devices().is_empty());
        assert!(DmTable::parse("").devices().is_empty());
    }

    #[test]
    fn test_volume_group_unescapes() {
        let dev = DmDevice::parse("vg--ora-lv--data;LVM-xyz;9;sdd").unwrap();
        assert_eq!(dev.volume_group().as_deref(), Some("vg-ora"));

        let not_lvm = DmDevice::parse("mpathb;mpath-36000c29;10;sde").unwrap();
        assert_eq!(not_lvm.volume_group(), None);
    }

    #[test]
    fn test_direct_lvm() {
        let table = DmTable::parse(TABLE);
        let m = table.membership("sda");
        assert_eq!(m.volume_group.as_deref(), Some("vg_root"));
        assert_eq!(m.multipath, None);
    }

    #[test]
    fn test_lvm_on_multipath() {
        let table = DmTable::parse(TABLE);
        let m = table.membership("sdc");
        assert_eq!(m.multipath.as_deref(), Some("mpatha"));
        assert_eq!(m.volume_group.as_deref(), Some("vg_data"));
    }

    #[test]
    fn test_unrelated_device() {
        let table = DmTable::parse(TABLE);
        assert_eq!(table.membership("sdb"), Membership::default());
        // sda is used, sdaa is not one of its partitions
        assert_eq!(table.membership("sdaa"), Membership::default());
    }

    #[test]
    fn test_partition_matching() {
        assert!(is_same_or_partition("sdc", "sdc"));
        assert!(is_same_or_partition("sdc1", "sdc"));
        assert!(!is_same_or_partition("sdcd", "sdc"));
        assert!(is_same_or_partition("dm-3p1", "dm-3"));
        assert!(!is_same_or_partition("dm-31", "dm-3"));
    }

    #[test]
    fn test_cycle_is_bounded() {
        let table = DmTable::parse("a;;1;sdz,dm-2\nb;;2;dm-1\n");
        assert_eq!(table.membership("sdz"), Membership::default());
    }
}
