// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Mock fact provider for testing.
//!
//! This module provides a [`SystemFacts`] implementation answering from
//! canned command output, so the inventory can be exercised against a
//! captured sysfs tree without the host tools.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use crate::{facts::SystemFacts, Error};

/// Canned answers for every fact the inventory asks for.
#[derive(Debug, Default)]
pub struct MockFacts {
    pci_listing: Option<String>,
    wwids: HashMap<PathBuf, String>,
    dm_table: String,
    asm_rules: Option<String>,
    asm_instance: Option<String>,
    asm_disks: String,
}

impl MockFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `lspci -D -v` output. Without one, the listing fails.
    pub fn with_pci_listing(mut self, listing: impl Into<String>) -> Self {
        self.pci_listing = Some(listing.into());
        self
    }

    /// Makes `scsi_id` report `wwid` for the generic device `dev`.
    pub fn with_wwid(mut self, dev: impl Into<PathBuf>, wwid: impl Into<String>) -> Self {
        self.wwids.insert(dev.into(), wwid.into());
        self
    }

    pub fn with_dm_table(mut self, table: impl Into<String>) -> Self {
        self.dm_table = table.into();
        self
    }

    pub fn with_asm_rules(mut self, rules: impl Into<String>) -> Self {
        self.asm_rules = Some(rules.into());
        self
    }

    /// Simulates a running ASM instance listing `disks`.
    pub fn with_asm_instance(mut self, sid: impl Into<String>, disks: impl Into<String>) -> Self {
        self.asm_instance = Some(sid.into());
        self.asm_disks = disks.into();
        self
    }
}

impl SystemFacts for MockFacts {
    fn pci_listing(&self) -> Result<String, Error> {
        self.pci_listing
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "lspci").into())
    }

    fn scsi_id(&self, generic_dev: &Path) -> Option<String> {
        self.wwids.get(generic_dev).cloned()
    }

    fn dm_table(&self) -> Result<String, Error> {
        Ok(self.dm_table.clone())
    }

    fn asm_rules(&self, _path: &Path) -> Option<String> {
        self.asm_rules.clone()
    }

    fn asm_instance(&self) -> Option<String> {
        self.asm_instance.clone()
    }

    fn asm_disks(&self, _sid: &str) -> Result<String, Error> {
        Ok(self.asm_disks.clone())
    }
}
