// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! WWN and WWID vendor lookup
//!
//! Normalizes Fibre Channel world wide names and SCSI world wide identifiers,
//! extracts the IEEE OUI they embed and names its vendor from a local copy of
//! the IEEE registry.

use std::{io, path::PathBuf};

use thiserror::Error;

pub mod address;
pub mod download;
pub mod registry;

pub use address::{Address, AddressKind, Format, Oui};
pub use registry::{resolve, Registry, Resolution, Vendor};

#[derive(Debug, Error)]
pub enum Error {
    /// IO operation error
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: &'static str },

    /// The registry file cannot be read
    #[error("cannot read OUI registry {}: {source}", .path.display())]
    RegistryUnavailable { path: PathBuf, source: io::Error },

    #[error("OUI registry {} holds no assignments", .0.display())]
    EmptyRegistry(PathBuf),

    #[error("download failed: {0}")]
    Download(#[from] ureq::Error),

    #[error("download cancelled")]
    Cancelled,
}
