// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! PCI storage controller discovery
//!
//! Parses the verbose listing produced by `lspci -D -v`. Each device is a
//! blank-line separated section whose first line carries the bus address,
//! class and description, followed by indented attribute lines.

use std::{fmt, sync::OnceLock};

use regex::Regex;
use serde::Serialize;

static HEADER_PATTERN: OnceLock<Regex> = OnceLock::new();
static IO_PORT_PATTERN: OnceLock<Regex> = OnceLock::new();

/// A storage-class PCI controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PciController {
    /// Full bus address including domain, e.g. `0000:03:00.0`
    pub address: String,
    /// Device class, e.g. `Serial Attached SCSI controller`
    pub class: String,
    /// Free-text description
    pub description: String,
    /// Base of the I/O port window, absent for MMIO-only controllers
    pub io_port: Option<u64>,
    /// Kernel driver bound to the controller
    pub driver: Option<String>,
}

impl fmt::Display for PciController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.description)
    }
}

impl PciController {
    /// Storage class as far as virtual SCSI controllers are concerned.
    pub fn is_scsi(&self) -> bool {
        self.class.contains("SCSI")
    }

    fn parse(section: &str) -> Option<Self> {
        let header = HEADER_PATTERN.get_or_init(|| {
            Regex::new(r"^(?:([0-9a-fA-F]{4}):)?([0-9a-fA-F]{2}:[0-9a-fA-F]{2}\.[0-7]) ([^:]+): (.*)$")
                .expect("Failed to initialise known-working regex")
        });
        let io_port = IO_PORT_PATTERN.get_or_init(|| {
            Regex::new(r"^\s*I/O ports at ([0-9a-fA-F]+)\b").expect("Failed to initialise known-working regex")
        });

        let mut lines = section.lines();
        let caps = header.captures(lines.next()?.trim_end())?;
        let domain = caps.get(1).map_or("0000", |m| m.as_str());

        let mut controller = Self {
            address: format!("{}:{}", domain, &caps[2]).to_lowercase(),
            class: caps[3].trim().to_owned(),
            description: caps[4].trim().to_owned(),
            io_port: None,
            driver: None,
        };

        for line in lines {
            if let Some(caps) = io_port.captures(line) {
                // Only the first window matters, later ones belong to bridges
                if controller.io_port.is_none() {
                    controller.io_port = u64::from_str_radix(&caps[1], 16).ok();
                }
            } else if let Some(driver) = line.trim().strip_prefix("Kernel driver in use:") {
                controller.driver = Some(driver.trim().to_owned());
            }
        }

        Some(controller)
    }
}

/// Parses an `lspci -D -v` listing into its SCSI storage controllers.
pub fn parse_listing(listing: &str) -> Vec<PciController> {
    listing
        .split("\n\n")
        .map(str::trim_start)
        .filter(|section| !section.is_empty())
        .filter_map(PciController::parse)
        .filter(PciController::is_scsi)
        .collect()
}
