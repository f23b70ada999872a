// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! System fact providers
//!
//! Everything the inventory learns from outside sysfs goes through
//! [`SystemFacts`], so the pipeline can be driven from captured output.

use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::{debug, warn};

use crate::{asm, context::Config, Error};

/// Locations `scsi_id` is installed at across distributions.
pub const SCSI_ID_PATHS: &[&str] = &["/usr/lib/udev/scsi_id", "/lib/udev/scsi_id"];

/// Sources of host facts consumed by the inventory.
pub trait SystemFacts: Sync {
    /// Verbose PCI listing (`lspci -D -v`).
    fn pci_listing(&self) -> Result<String, Error>;

    /// WWID reported for a generic device node, if any.
    fn scsi_id(&self, generic_dev: &Path) -> Option<String>;

    /// Device-mapper table (`dmsetup info -c ...`).
    fn dm_table(&self) -> Result<String, Error>;

    /// Contents of the ASM udev rules file, if present.
    fn asm_rules(&self, path: &Path) -> Option<String>;

    /// SID of the running ASM instance, if any.
    fn asm_instance(&self) -> Option<String>;

    /// ASM disk listing from the instance `sid`, see [`asm::DISK_QUERY`].
    fn asm_disks(&self, sid: &str) -> Result<String, Error>;
}

/// Facts gathered from the live host.
#[derive(Debug)]
pub struct HostFacts {
    /// Root of the proc filesystem
    proc_dir: PathBuf,
    /// Oracle home used to locate `sqlplus`
    oracle_home: Option<PathBuf>,
}

impl HostFacts {
    pub fn new(oracle_home: Option<PathBuf>) -> Self {
        Self {
            proc_dir: PathBuf::from("/proc"),
            oracle_home,
        }
    }
}

/// Runs `program` and returns its stdout, failing on a non-zero exit.
fn run_command(program: &str, args: &[&str]) -> Result<String, Error> {
    debug!("running {program} {}", args.join(" "));
    let output = Command::new(program).args(args).output()?;
    if !output.status.success() {
        return Err(Error::Command {
            program: program.to_owned(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// First installed `scsi_id`.
pub fn scsi_id_binary() -> Option<&'static str> {
    SCSI_ID_PATHS.iter().copied().find(|p| Path::new(p).exists())
}

impl SystemFacts for HostFacts {
    fn pci_listing(&self) -> Result<String, Error> {
        run_command("lspci", &["-D", "-v"])
    }

    fn scsi_id(&self, generic_dev: &Path) -> Option<String> {
        let binary = scsi_id_binary()?;
        let device = generic_dev.to_str()?;
        match run_command(binary, &["-g", "-u", "-d", device]) {
            Ok(out) => Some(out.trim().to_owned()).filter(|wwid| !wwid.is_empty()),
            Err(e) => {
                debug!("no WWID for {device}: {e}");
                None
            }
        }
    }

    fn dm_table(&self) -> Result<String, Error> {
        run_command(
            "dmsetup",
            &[
                "info",
                "-c",
                "--noheadings",
                "--separator",
                ";",
                "-o",
                "name,uuid,minor,blkdevs_used",
            ],
        )
    }

    fn asm_rules(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("no ASM udev rules at {}: {e}", path.display());
                None
            }
        }
    }

    fn asm_instance(&self) -> Option<String> {
        let entries = fs::read_dir(&self.proc_dir).ok()?;
        entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_str().is_some_and(|n| n.chars().all(|c| c.is_ascii_digit())))
            .filter_map(|e| fs::read_to_string(e.path().join("comm")).ok())
            .find_map(|comm| asm::instance_from_process(&comm).map(str::to_owned))
    }

    fn asm_disks(&self, sid: &str) -> Result<String, Error> {
        let home = self
            .oracle_home
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "ORACLE_HOME is not set"))?;
        let sqlplus = home.join("bin/sqlplus");

        debug!("querying ASM instance {sid} through {}", sqlplus.display());
        let mut child = Command::new(&sqlplus)
            .args(["-S", "/", "as", "sysasm"])
            .env("ORACLE_SID", sid)
            .env("ORACLE_HOME", home)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(asm::DISK_QUERY.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            warn!("sqlplus exited with {}", output.status);
            return Err(Error::Command {
                program: sqlplus.display().to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Facts for a captured sysfs tree.
///
/// Command output and `/proc` describe the running host, not the captured
/// one, so nothing is answered and devices keep their sysfs facts only.
#[derive(Debug, Default)]
pub struct CapturedFacts;

impl SystemFacts for CapturedFacts {
    fn pci_listing(&self) -> Result<String, Error> {
        Err(Error::HostOnly("lspci"))
    }

    fn scsi_id(&self, _generic_dev: &Path) -> Option<String> {
        None
    }

    fn dm_table(&self) -> Result<String, Error> {
        Err(Error::HostOnly("dmsetup"))
    }

    fn asm_rules(&self, _path: &Path) -> Option<String> {
        None
    }

    fn asm_instance(&self) -> Option<String> {
        None
    }

    fn asm_disks(&self, _sid: &str) -> Result<String, Error> {
        Err(Error::HostOnly("sqlplus"))
    }
}

/// Picks the provider matching the tree `config` reads.
pub fn for_config(config: &Config, oracle_home: Option<PathBuf>) -> Box<dyn SystemFacts> {
    if config.is_live() {
        Box::new(HostFacts::new(oracle_home))
    } else {
        warn!(
            "{} is a captured tree, skipping WWID, device-mapper and ASM lookups",
            config.sysroot.display()
        );
        Box::new(CapturedFacts)
    }
}
