// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SCSI device enumeration and handling
//!
//! Every attached SCSI device (disks, CD-ROMs, enclosures, ...) appears under
//! `/sys/bus/scsi/devices` named by its H:B:T:L address. Host and target
//! nodes (`host0`, `target0:0:0`) share the directory and are skipped.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{sysfs, Error, ScsiAddress, SCSI_DEVICES_DIR};

/// Lists every SCSI device address present below `sysroot`.
///
/// The result is in directory order; callers sort when they need to.
pub fn enumerate(sysroot: &Path) -> Result<Vec<ScsiAddress>, Error> {
    let dir = sysroot.join(SCSI_DEVICES_DIR);
    let entries = fs::read_dir(&dir).map_err(|source| Error::ScsiTreeUnavailable {
        path: dir.clone(),
        source,
    })?;

    let items: Vec<ScsiAddress> = entries
        .filter_map(Result::ok)
        .filter_map(|e| e.file_name().to_str()?.parse().ok())
        .collect();

    debug!("found {} SCSI devices below {}", items.len(), dir.display());
    Ok(items)
}

/// The sysfs view of a single SCSI device.
#[derive(Debug)]
pub struct Device {
    /// Path of the device node, e.g. `/sys/bus/scsi/devices/2:0:1:0`
    node: PathBuf,
}

impl Device {
    pub fn new(sysroot: &Path, address: &ScsiAddress) -> Self {
        Self {
            node: sysroot.join(SCSI_DEVICES_DIR).join(address.to_string()),
        }
    }

    pub fn node(&self) -> &Path {
        &self.node
    }

    /// Name of the bound generic device (`sg1`), if any.
    pub fn generic_name(&self) -> Option<String> {
        // Older kernels expose `scsi_generic:sg1` links directly on the device
        sysfs::entries(&self.node.join("scsi_generic"))
            .into_iter()
            .next()
            .or_else(|| {
                sysfs::first_entry(&self.node, "scsi_generic:")
                    .map(|link| link.trim_start_matches("scsi_generic:").to_owned())
            })
    }

    /// Name of the bound block device (`sdb`), if any.
    pub fn block_name(&self) -> Option<String> {
        sysfs::entries(&self.node.join("block"))
            .into_iter()
            .next()
            .or_else(|| {
                sysfs::first_entry(&self.node, "block:").map(|link| link.trim_start_matches("block:").to_owned())
            })
    }

    /// Vendor identification, whitespace-trimmed.
    pub fn vendor(&self) -> Option<String> {
        sysfs::read(&self.node, "vendor")
    }

    /// Model identification, whitespace-trimmed.
    pub fn model(&self) -> Option<String> {
        sysfs::read(&self.node, "model")
    }

    /// Sector count (512-byte units) of the bound block device.
    pub fn sectors(&self, block: &str) -> Option<u64> {
        sysfs::read(&self.node.join("block").join(block), "size")
    }
}
