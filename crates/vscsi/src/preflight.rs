// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Preconditions checked before any device is inspected

use std::{fs, path::Path};

use log::debug;
use nix::{sys::utsname::uname, unistd::geteuid};

use crate::{facts, Config, Error};

/// Oldest supported kernel major version.
const MIN_KERNEL_MAJOR: u32 = 3;

/// Utilities the inventory shells out to.
pub const REQUIRED_UTILITIES: &[&str] = &["lspci", "dmsetup"];

/// DMI attribute naming the system vendor.
const DMI_VENDOR: &str = "sys/class/dmi/id/sys_vendor";

/// Which checks a command needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preflight {
    /// Refuse to run outside a VMware guest
    pub require_vmware: bool,
}

impl Preflight {
    /// Runs the checks in order, failing on the first unmet precondition.
    ///
    /// A sysroot other than `/` means a captured tree is being inspected;
    /// only the checks that concern that tree are run then.
    pub fn run(&self, config: &Config) -> Result<(), Error> {
        let live = config.is_live();

        if live {
            check_os()?;
            check_privilege()?;
            check_utilities()?;
        }

        if self.require_vmware {
            check_vmware(&config.sysroot)?;
        }

        Ok(())
    }
}

/// Linux with a recent enough kernel.
pub fn check_os() -> Result<(), Error> {
    let uts = uname().map_err(std::io::Error::from)?;
    let sysname = uts.sysname().to_string_lossy();
    if sysname != "Linux" {
        return Err(Error::UnsupportedOs(sysname.into_owned()));
    }

    let release = uts.release().to_string_lossy();
    match kernel_major(&release) {
        Some(major) if major >= MIN_KERNEL_MAJOR => {
            debug!("running on Linux {release}");
            Ok(())
        }
        _ => Err(Error::UnsupportedKernel(release.into_owned())),
    }
}

fn kernel_major(release: &str) -> Option<u32> {
    release.split('.').next()?.parse().ok()
}

/// Effective uid 0, needed for `scsi_id` and `dmsetup`.
pub fn check_privilege() -> Result<(), Error> {
    if geteuid().is_root() {
        Ok(())
    } else {
        Err(Error::NotPrivileged)
    }
}

pub fn check_utilities() -> Result<(), Error> {
    for utility in REQUIRED_UTILITIES {
        which::which(utility).map_err(|_| Error::MissingUtility((*utility).to_owned()))?;
    }

    if facts::scsi_id_binary().is_none() {
        return Err(Error::MissingUtility("scsi_id".to_owned()));
    }

    Ok(())
}

/// The DMI system vendor names VMware.
pub fn check_vmware(sysroot: &Path) -> Result<(), Error> {
    let vendor = fs::read_to_string(sysroot.join(DMI_VENDOR)).unwrap_or_default();
    let vendor = vendor.trim();
    if vendor.contains("VMware") {
        Ok(())
    } else {
        Err(Error::NotVmware(if vendor.is_empty() { "unknown".to_owned() } else { vendor.to_owned() }))
    }
}
