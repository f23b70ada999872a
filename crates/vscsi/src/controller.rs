// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! VMware virtual SCSI controller ordering
//!
//! The hypervisor never tells the guest which Linux SCSI host belongs to
//! which virtual controller (`SCSI(0:x)`, `SCSI(1:x)`, ...). The BIOS walks
//! the PCI bus in ascending I/O port order, which is also the order the
//! virtual controllers were numbered in, so sorting the controllers by I/O
//! port base recovers the controller index. The Linux host number then comes
//! from the `host*` node the kernel created below the PCI device.

use std::{collections::BTreeMap, path::Path};

use itertools::Itertools;
use log::{debug, warn};
use serde::Serialize;

use crate::{pci::PciController, sysfs, PCI_DEVICES_DIR};

/// One controller with a recovered index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedController {
    /// Virtual controller index, position in I/O port order
    pub index: u32,
    /// Linux SCSI host number
    pub host: u32,
    pub controller: PciController,
}

/// Virtual controller index to Linux SCSI host mapping.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ControllerMap {
    controllers: Vec<MappedController>,
    #[serde(skip)]
    by_host: BTreeMap<u32, u32>,
}

impl ControllerMap {
    /// Orders `controllers` by I/O port and resolves each to its Linux host
    /// through the PCI sysfs tree below `sysroot`.
    ///
    /// Controllers without an I/O port, or whose host node cannot be found,
    /// are left out of the map.
    pub fn resolve(sysroot: &Path, controllers: &[PciController]) -> Self {
        let pci_dir = sysroot.join(PCI_DEVICES_DIR);
        Self::from_controllers(controllers, |address| host_number(&pci_dir.join(address)))
    }

    /// Orders `controllers` by I/O port, resolving hosts through `lookup`.
    pub fn from_controllers<F>(controllers: &[PciController], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<u32>,
    {
        let ordered = controllers
            .iter()
            .filter(|c| {
                if c.io_port.is_none() {
                    warn!("controller {} has no I/O port and cannot be ordered", c.address);
                }
                c.io_port.is_some()
            })
            .sorted_by_key(|c| c.io_port);

        let mut map = Self::default();
        for (index, controller) in ordered.enumerate() {
            let index = index as u32;
            let Some(host) = lookup(&controller.address) else {
                warn!("no SCSI host found below PCI device {}", controller.address);
                continue;
            };

            debug!("controller {index} -> host{host} ({controller})");
            map.by_host.insert(host, index);
            map.controllers.push(MappedController {
                index,
                host,
                controller: controller.clone(),
            });
        }

        map
    }

    /// Virtual controller index for a Linux SCSI host.
    pub fn index_of(&self, host: u32) -> Option<u32> {
        self.by_host.get(&host).copied()
    }

    /// Mapped controllers in index order.
    pub fn controllers(&self) -> &[MappedController] {
        &self.controllers
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// Extracts N from the `hostN` node below a PCI device directory.
fn host_number(pci_node: &Path) -> Option<u32> {
    sysfs::entries(pci_node)
        .iter()
        .filter_map(|name| name.strip_prefix("host")?.parse().ok())
        .next()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::pci;

    fn controller(address: &str, io_port: Option<u64>) -> PciController {
        PciController {
            address: address.to_owned(),
            class: "Serial Attached SCSI controller".to_owned(),
            description: "VMware PVSCSI SCSI Controller".to_owned(),
            io_port,
            driver: None,
        }
    }

    #[test]
    fn test_orders_by_io_port() {
        // Bus order and host numbering disagree with I/O port order on purpose
        let controllers = [
            controller("0000:03:00.0", Some(0x5000)),
            controller("0000:0b:00.0", Some(0x3000)),
            controller("0000:13:00.0", Some(0x4000)),
        ];
        let hosts = BTreeMap::from([("0000:03:00.0", 2), ("0000:0b:00.0", 3), ("0000:13:00.0", 4)]);
        let map = ControllerMap::from_controllers(&controllers, |a| hosts.get(a).copied());

        assert_eq!(map.index_of(3), Some(0));
        assert_eq!(map.index_of(4), Some(1));
        assert_eq!(map.index_of(2), Some(2));

        let ports: Vec<_> = map.controllers().iter().map(|c| c.controller.io_port).collect();
        assert!(ports.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_omits_mmio_only() {
        let controllers = [controller("0000:03:00.0", None), controller("0000:0b:00.0", Some(0x4000))];
        let map = ControllerMap::from_controllers(&controllers, |a| match a {
            "0000:03:00.0" => Some(2),
            _ => Some(3),
        });
        assert_eq!(map.controllers().len(), 1);
        assert_eq!(map.index_of(3), Some(0));
        assert_eq!(map.index_of(2), None);
    }

    #[test]
    fn test_empty_input() {
        let map = ControllerMap::from_controllers(&[], |_| Some(0));
        assert!(map.is_empty());
        assert_eq!(map.index_of(0), None);
    }

    #[test_log::test]
    fn test_resolve_fixture() {
        let sysroot = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/vmware");
        let controllers = pci::parse_listing(include_str!("../tests/fixtures/lspci-v.txt"));
        let map = ControllerMap::resolve(&sysroot, &controllers);

        let pairs: Vec<_> = map.controllers().iter().map(|c| (c.index, c.host)).collect();
        assert_eq!(pairs, [(0, 0), (1, 2), (2, 3)]);
        assert_eq!(map.index_of(4), None);
    }
}
