// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Inventory of SCSI devices on Linux guests running under VMware
//!
//! Correlates kernel SCSI addresses and block devices with the VMware virtual
//! controller they are attached to, and with the WWID, multipath map, LVM
//! volume group and Oracle ASM disk group they belong to.

use std::{io, path::PathBuf};

use log::info;
use rayon::prelude::*;
use thiserror::Error;

pub mod address;
pub mod asm;
pub mod capacity;
pub mod context;
pub mod controller;
pub mod dm;
pub mod facts;
pub mod mock;
pub mod pci;
pub mod preflight;
pub mod record;
pub mod render;
pub mod scsi;
mod sysfs;

pub use address::ScsiAddress;
pub use context::{Config, RunContext};
pub use facts::{CapturedFacts, HostFacts, SystemFacts};
pub use record::DeviceRecord;

const SCSI_DEVICES_DIR: &str = "sys/bus/scsi/devices";
const PCI_DEVICES_DIR: &str = "sys/bus/pci/devices";
const DEVFS_DIR: &str = "/dev";

/// Errors that abort an inventory run
#[derive(Debug, Error)]
pub enum Error {
    /// IO operation error
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("unsupported kernel version: {0}")]
    UnsupportedKernel(String),

    #[error("must be run as root")]
    NotPrivileged,

    #[error("required utility not found: {0}")]
    MissingUtility(String),

    /// The kernel SCSI device directory cannot be read
    #[error("cannot open {}: {source}", .path.display())]
    ScsiTreeUnavailable { path: PathBuf, source: io::Error },

    #[error("not running on VMware (system vendor: {0})")]
    NotVmware(String),

    /// A string that is not an H:B:T:L address
    #[error("invalid SCSI address: {0}")]
    InvalidAddress(String),

    /// A fact that only the running host can answer was asked about a
    /// captured tree
    #[error("{0} is only available for the running host")]
    HostOnly(&'static str),

    /// An external command exited unsuccessfully
    #[error("{program} failed ({}): {stderr}", .status.map_or("killed".to_owned(), |s| format!("exit {s}")))]
    Command {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
}

/// Result of an inventory run.
#[derive(Debug)]
pub struct Inventory {
    pub context: RunContext,
    pub records: Vec<DeviceRecord>,
}

/// Enumerates every SCSI device and builds its record.
///
/// Records come back in enumeration order, or sorted by address when
/// `sorted` is set.
pub fn inventory(config: &Config, facts: &dyn SystemFacts, sorted: bool) -> Result<Inventory, Error> {
    let addresses = scsi::enumerate(&config.sysroot)?;
    let context = RunContext::gather(config, facts);

    info!("inspecting {} SCSI devices", addresses.len());
    let mut records: Vec<DeviceRecord> = addresses
        .par_iter()
        .map(|address| DeviceRecord::build(&context, facts, *address))
        .collect();

    if sorted {
        records.sort_by_key(|r| r.address);
    }

    Ok(Inventory { context, records })
}

/// Resolves the virtual controller map on its own.
pub fn controllers(config: &Config, facts: &dyn SystemFacts) -> controller::ControllerMap {
    RunContext::controllers(config, facts)
}
