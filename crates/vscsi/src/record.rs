// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Per-device inventory records
//!
//! A [`DeviceRecord`] reconciles what sysfs, `scsi_id`, the ASM rules and
//! instance, and device-mapper say about one SCSI device. Anything that
//! cannot be determined for a device becomes an explicit sentinel variant;
//! building a record never fails.

use std::{fmt, path::PathBuf};

use log::debug;
use serde::Serialize;

use crate::{
    asm::AsmDisk,
    capacity::Capacity,
    context::{AsmState, RunContext},
    facts::SystemFacts,
    scsi, ScsiAddress, DEVFS_DIR,
};

/// Controller a device hangs off, as far as it could be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerSlot {
    /// VMware virtual controller index
    Virtual(u32),
    /// Raw Linux host number, the host is not in the controller map
    Host(u32),
}

impl ControllerSlot {
    pub fn number(&self) -> u32 {
        match self {
            ControllerSlot::Virtual(n) | ControllerSlot::Host(n) => *n,
        }
    }
}

/// Controller-relative address as shown in the VM settings, `SCSI(c:t)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VirtualAddress {
    pub controller: ControllerSlot,
    pub target: u32,
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.controller.number(), self.target)
    }
}

/// Block device bound to a SCSI device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockDevice {
    Bound(String),
    /// No block layer driver is bound (tapes, changers, enclosures)
    Unbound,
}

impl BlockDevice {
    pub fn name(&self) -> Option<&str> {
        match self {
            BlockDevice::Bound(name) => Some(name),
            BlockDevice::Unbound => None,
        }
    }
}

/// World wide identifier of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Wwid {
    Known(String),
    /// Not reported, expected when `disk.EnableUUID` is off for the VM
    Unavailable,
}

impl Wwid {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Wwid::Known(wwid) => Some(wwid),
            Wwid::Unavailable => None,
        }
    }
}

/// Details from the ASM instance for an ASM disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AsmEnrichment {
    NotRequested,
    /// Requested, but no ASM instance is running
    InstanceDown,
    /// The instance does not list this disk
    NotListed,
    Listed(AsmDisk),
}

/// Storage stack a device belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Asm { disk: String, enrichment: AsmEnrichment },
    Lvm { volume_group: String },
    Unclassified,
}

/// Everything known about one SCSI device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRecord {
    pub hostname: String,
    pub address: ScsiAddress,
    pub virtual_address: VirtualAddress,
    pub vendor: Option<String>,
    pub model: Option<String>,
    /// Generic device, e.g. `sg1`
    pub generic: Option<String>,
    pub block: BlockDevice,
    pub wwid: Wwid,
    /// Multipath map the block device is a path of
    pub multipath: Option<String>,
    pub classification: Classification,
    pub capacity: Capacity,
}

impl DeviceRecord {
    /// Builds the record for `address` from the run context and providers.
    pub fn build(ctx: &RunContext, facts: &dyn SystemFacts, address: ScsiAddress) -> Self {
        let device = scsi::Device::new(ctx.sysroot(), &address);

        let controller = match ctx.controllers.index_of(address.host) {
            Some(index) => ControllerSlot::Virtual(index),
            None => ControllerSlot::Host(address.host),
        };

        let generic = device.generic_name();
        let block = device.block_name().map_or(BlockDevice::Unbound, BlockDevice::Bound);

        let wwid = match (&block, &generic) {
            (BlockDevice::Bound(_), Some(sg)) => facts.scsi_id(&PathBuf::from(DEVFS_DIR).join(sg)),
            _ => None,
        }
        .map_or(Wwid::Unavailable, Wwid::Known);

        let membership = block
            .name()
            .map(|name| ctx.dm_table.membership(name))
            .unwrap_or_default();

        let classification = classify(ctx, &wwid, membership.volume_group);
        let capacity = Capacity::from(block.name().and_then(|name| device.sectors(name)));

        debug!("{address}: {block:?} {wwid:?} {classification:?} {capacity:?}");

        Self {
            hostname: ctx.hostname.clone(),
            address,
            virtual_address: VirtualAddress {
                controller,
                target: address.target,
            },
            vendor: device.vendor(),
            model: device.model(),
            generic,
            block,
            wwid,
            multipath: membership.multipath,
            classification,
            capacity,
        }
    }
}

/// ASM membership takes precedence over LVM.
fn classify(ctx: &RunContext, wwid: &Wwid, volume_group: Option<String>) -> Classification {
    if let Some(disk) = wwid.as_str().and_then(|w| ctx.asm_rules.device_for(w)) {
        let enrichment = match &ctx.asm {
            AsmState::NotRequested => AsmEnrichment::NotRequested,
            AsmState::InstanceDown => AsmEnrichment::InstanceDown,
            AsmState::Available(disks) => disks
                .get(disk)
                .cloned()
                .map_or(AsmEnrichment::NotListed, AsmEnrichment::Listed),
        };
        return Classification::Asm {
            disk: disk.to_owned(),
            enrichment,
        };
    }

    match volume_group {
        Some(volume_group) => Classification::Lvm { volume_group },
        None => Classification::Unclassified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{AsmState, Config},
        mock::MockFacts,
    };

    const ASM_WWID: &str = "36000c29a5f3e8b7c1d2e4f6a8b0c2d4e";

    fn facts() -> MockFacts {
        MockFacts::new()
            .with_pci_listing(include_str!("../tests/fixtures/lspci-v.txt"))
            .with_dm_table(include_str!("../tests/fixtures/dmsetup-info.txt"))
            .with_asm_rules(include_str!("../tests/fixtures/99-oracle-asmdevices.rules"))
            .with_wwid("/dev/sg0", "36000c2911111111111111111111111a0")
            .with_wwid("/dev/sg1", ASM_WWID)
            .with_wwid("/dev/sg2", "36000c29d2b1c4f7a8e3e5f0b9a1c2d3e")
            .with_wwid("/dev/sg3", "36000c29tape")
    }

    fn context(facts: &MockFacts, asm: bool) -> RunContext {
        let config = Config {
            sysroot: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/vmware"),
            hostname: Some("dbhost01".to_owned()),
            asm,
            ..Default::default()
        };
        RunContext::gather(&config, facts)
    }

    fn build(address: &str) -> DeviceRecord {
        let facts = facts();
        let ctx = context(&facts, false);
        DeviceRecord::build(&ctx, &facts, address.parse().unwrap())
    }

    #[test]
    fn test_asm_disk() {
        let record = build("2:0:0:0");
        assert_eq!(record.virtual_address.to_string(), "1:0");
        assert_eq!(record.virtual_address.controller, ControllerSlot::Virtual(1));
        assert_eq!(record.generic.as_deref(), Some("sg1"));
        assert_eq!(record.block, BlockDevice::Bound("sdb".to_owned()));
        assert_eq!(record.wwid, Wwid::Known(ASM_WWID.to_owned()));
        assert_eq!(
            record.classification,
            Classification::Asm {
                disk: "asm_data01".to_owned(),
                enrichment: AsmEnrichment::NotRequested,
            }
        );
        assert_eq!(record.capacity, Capacity::from_sectors(20_971_520));
        assert_eq!(record.vendor.as_deref(), Some("VMware"));
        assert_eq!(record.hostname, "dbhost01");
    }

    #[test]
    fn test_lvm_on_multipath() {
        let record = build("2:0:1:0");
        assert_eq!(record.multipath.as_deref(), Some("mpatha"));
        assert_eq!(
            record.classification,
            Classification::Lvm {
                volume_group: "vg_data".to_owned()
            }
        );
    }

    #[test]
    fn test_lvm_on_lsi_controller() {
        let record = build("0:0:0:0");
        assert_eq!(record.virtual_address.controller, ControllerSlot::Virtual(0));
        assert_eq!(
            record.classification,
            Classification::Lvm {
                volume_group: "vg_root".to_owned()
            }
        );
    }

    #[test]
    fn test_unmapped_host_falls_back() {
        let record = build("1:0:0:0");
        assert_eq!(record.virtual_address.controller, ControllerSlot::Host(1));
        assert_eq!(record.virtual_address.to_string(), "1:0");
        assert_eq!(record.block, BlockDevice::Bound("sr0".to_owned()));
        // No WWID registered for sg4, and sr0 has no size attribute
        assert_eq!(record.wwid, Wwid::Unavailable);
        assert_eq!(record.classification, Classification::Unclassified);
        assert_eq!(record.capacity, Capacity::Unreadable);
    }

    #[test]
    fn test_no_block_device() {
        let record = build("2:0:2:0");
        assert_eq!(record.block, BlockDevice::Unbound);
        assert_eq!(record.generic.as_deref(), Some("sg3"));
        // scsi_id is only consulted for devices with a block layer
        assert_eq!(record.wwid, Wwid::Unavailable);
        assert_eq!(record.classification, Classification::Unclassified);
        assert_eq!(record.capacity, Capacity::Unreadable);
    }

    #[test]
    fn test_asm_enrichment() {
        let facts = facts().with_asm_instance("+ASM1", "/dev/oracleasm/asm_data01p1 MEMBER DATA 10239\n");
        let ctx = context(&facts, true);
        let record = DeviceRecord::build(&ctx, &facts, ScsiAddress::new(2, 0, 0, 0));
        let Classification::Asm { enrichment, .. } = record.classification else {
            panic!("expected an ASM disk");
        };
        let AsmEnrichment::Listed(disk) = enrichment else {
            panic!("expected the disk to be listed");
        };
        assert_eq!(disk.group.as_deref(), Some("DATA"));
        assert_eq!(disk.size_mb, 10239);
    }

    #[test]
    fn test_asm_enrichment_instance_down() {
        let facts = facts();
        let ctx = context(&facts, true);
        assert!(matches!(ctx.asm, AsmState::InstanceDown));
        let record = DeviceRecord::build(&ctx, &facts, ScsiAddress::new(2, 0, 0, 0));
        assert!(matches!(
            record.classification,
            Classification::Asm {
                enrichment: AsmEnrichment::InstanceDown,
                ..
            }
        ));
    }

    #[test]
    fn test_asm_disk_not_listed() {
        let facts = facts().with_asm_instance("+ASM1", "");
        let ctx = context(&facts, true);
        let record = DeviceRecord::build(&ctx, &facts, ScsiAddress::new(2, 0, 0, 0));
        assert!(matches!(
            record.classification,
            Classification::Asm {
                enrichment: AsmEnrichment::NotListed,
                ..
            }
        ));
    }
}
