// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Run-scoped facts
//!
//! Everything shared between devices is gathered once into a [`RunContext`]
//! before any device is inspected, and only read afterwards.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::{
    asm::{AsmDisks, AsmRules},
    controller::ControllerMap,
    dm::DmTable,
    facts::SystemFacts,
    pci,
};

/// Default location of the Oracle ASM udev rules.
pub const ASM_RULES_PATH: &str = "/etc/udev/rules.d/99-oracle-asmdevices.rules";

/// Settings for one inventory run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root the sysfs tree is read below
    pub sysroot: PathBuf,
    /// ASM udev rules file
    pub asm_rules: PathBuf,
    /// Query the ASM instance for disk group membership
    pub asm: bool,
    /// Reported host name, defaults to the running host's
    pub hostname: Option<String>,
}

impl Config {
    /// Whether the sysfs tree read is the running host's own.
    pub fn is_live(&self) -> bool {
        self.sysroot == Path::new("/")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sysroot: PathBuf::from("/"),
            asm_rules: PathBuf::from(ASM_RULES_PATH),
            asm: false,
            hostname: None,
        }
    }
}

/// State of the ASM instance query.
#[derive(Debug, Clone, Default)]
pub enum AsmState {
    /// Enrichment was not asked for
    #[default]
    NotRequested,
    /// Enrichment was asked for but no instance is running
    InstanceDown,
    /// Disks listed by the running instance
    Available(AsmDisks),
}

/// Read-only facts shared by every device record of a run.
#[derive(Debug)]
pub struct RunContext {
    pub hostname: String,
    pub sysroot: PathBuf,
    pub controllers: ControllerMap,
    pub asm_rules: AsmRules,
    pub dm_table: DmTable,
    pub asm: AsmState,
}

impl RunContext {
    /// Gathers the run-scoped facts. Unavailable sources degrade to empty
    /// data rather than failing the run.
    pub fn gather(config: &Config, facts: &dyn SystemFacts) -> Self {
        let controllers = Self::controllers(config, facts);

        let asm_rules = facts
            .asm_rules(&config.asm_rules)
            .map(|text| AsmRules::parse(&text))
            .unwrap_or_default();

        let dm_table = match facts.dm_table() {
            Ok(text) => DmTable::parse(&text),
            Err(e) => {
                warn!("cannot read device-mapper table: {e}");
                DmTable::default()
            }
        };

        let asm = if config.asm { query_asm(facts) } else { AsmState::NotRequested };

        let ctx = Self {
            hostname: config.hostname.clone().unwrap_or_else(local_hostname),
            sysroot: config.sysroot.clone(),
            controllers,
            asm_rules,
            dm_table,
            asm,
        };
        debug!(
            "run context: {} controllers, {} dm devices",
            ctx.controllers.controllers().len(),
            ctx.dm_table.devices().len()
        );
        ctx
    }

    /// Resolves the virtual controller map, empty when the PCI listing is
    /// unavailable.
    pub fn controllers(config: &Config, facts: &dyn SystemFacts) -> ControllerMap {
        match facts.pci_listing() {
            Ok(listing) => ControllerMap::resolve(&config.sysroot, &pci::parse_listing(&listing)),
            Err(e) => {
                warn!("cannot list PCI controllers, reporting raw host numbers: {e}");
                ControllerMap::default()
            }
        }
    }

    pub fn sysroot(&self) -> &Path {
        &self.sysroot
    }
}

fn query_asm(facts: &dyn SystemFacts) -> AsmState {
    let Some(sid) = facts.asm_instance() else {
        warn!("ASM details requested but no ASM instance is running");
        return AsmState::InstanceDown;
    };

    info!("querying ASM instance {sid}");
    match facts.asm_disks(&sid) {
        Ok(text) => AsmState::Available(AsmDisks::parse(&text)),
        Err(e) => {
            warn!("cannot list disks of ASM instance {sid}: {e}");
            AsmState::InstanceDown
        }
    }
}

fn local_hostname() -> String {
    nix::unistd::gethostname()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_owned())
}
