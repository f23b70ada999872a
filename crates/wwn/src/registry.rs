// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! IEEE OUI registry
//!
//! Reads the public `oui.txt` dump, where every assignment appears as
//!
//! ```text
//! 00-50-76   (hex)		IBM Corp
//! 005076     (base 16)		IBM Corp
//! ```

use std::{collections::HashMap, fs, path::Path, sync::OnceLock};

use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::{
    address::{Address, AddressKind, Format, Oui},
    Error,
};

static ENTRY_PATTERN: OnceLock<Regex> = OnceLock::new();

/// OUI to vendor name assignments.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    vendors: HashMap<String, String>,
}

impl Registry {
    pub fn parse(text: &str) -> Self {
        let entry = ENTRY_PATTERN.get_or_init(|| {
            Regex::new(r"^\s*([0-9A-Fa-f]{2})[-:]?([0-9A-Fa-f]{2})[-:]?([0-9A-Fa-f]{2})\s+\((?:hex|base 16)\)\s+(.*?)\s*$")
                .expect("Failed to initialise known-working regex")
        });

        let vendors = text
            .lines()
            .filter_map(|line| entry.captures(line))
            .filter(|caps| !caps[4].is_empty())
            .map(|caps| {
                let oui = format!("{}{}{}", &caps[1], &caps[2], &caps[3]).to_ascii_uppercase();
                (oui, caps[4].to_owned())
            })
            .collect();

        Self { vendors }
    }

    /// Loads a registry file. A file without a single assignment is an error.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::RegistryUnavailable {
            path: path.to_owned(),
            source,
        })?;
        let registry = Self::parse(&text);
        if registry.is_empty() {
            return Err(Error::EmptyRegistry(path.to_owned()));
        }

        debug!("loaded {} OUI assignments from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn lookup(&self, oui: &Oui) -> Option<&str> {
        self.vendors.get(oui.as_str()).map(String::as_str)
    }

    /// Resolves the vendor of an already parsed address. The registry is
    /// not consulted when no OUI can be extracted.
    pub fn resolve(&self, address: Address) -> Resolution {
        let oui = address.oui();
        let vendor = match &oui {
            Some(oui) => self
                .lookup(oui)
                .map_or(Vendor::NotFound, |name| Vendor::Found(name.to_owned())),
            None => Vendor::Unknown,
        };

        Resolution {
            kind: address.kind(),
            format: address.format(),
            address,
            oui,
            vendor,
        }
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

/// Outcome of the vendor lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Found(String),
    /// The OUI is not assigned in the registry
    NotFound,
    /// No OUI could be extracted, nothing was looked up
    Unknown,
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vendor::Found(name) => f.write_str(name),
            Vendor::NotFound => f.write_str("vendor not found"),
            Vendor::Unknown => f.write_str("vendor unknown"),
        }
    }
}

/// Everything learned about one address.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub address: Address,
    pub kind: AddressKind,
    pub format: Format,
    pub oui: Option<Oui>,
    pub vendor: Vendor,
}

/// Parses `input` and resolves its vendor against `registry`.
pub fn resolve(input: &str, registry: &Registry) -> Result<Resolution, Error> {
    Ok(registry.resolve(input.parse()?))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn registry() -> Registry {
        Registry::parse(include_str!("../tests/fixtures/oui.txt"))
    }

    #[test]
    fn test_parse() {
        let registry = registry();
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.lookup(&"005076".parse().unwrap()), Some("IBM Corp"));
        assert_eq!(registry.lookup(&"000C29".parse().unwrap()), Some("VMware, Inc."));
    }

    #[test]
    fn test_parse_single_line() {
        let registry = Registry::parse("005076 (hex) IBM Corp");
        assert_eq!(registry.lookup(&"005076".parse().unwrap()), Some("IBM Corp"));
    }

    #[test]
    fn test_resolve_wwn() {
        let res = resolve("50:05:07:68:0c:51:1e:1a", &registry()).unwrap();
        assert_eq!(res.kind, AddressKind::Wwn);
        assert_eq!(res.oui.unwrap().as_str(), "005076");
        assert_eq!(res.vendor, Vendor::Found("IBM Corp".to_owned()));
    }

    #[test]
    fn test_resolve_not_found() {
        let res = resolve("5001234560000000", &registry()).unwrap();
        assert_eq!(res.oui.unwrap().as_str(), "001234");
        assert_eq!(res.vendor, Vendor::NotFound);
    }

    #[test]
    fn test_resolve_unknown_layout() {
        let res = resolve("9000000000000000", &registry()).unwrap();
        assert_eq!(res.format, Format::Unknown);
        assert_eq!(res.oui, None);
        assert_eq!(res.vendor, Vendor::Unknown);
    }

    #[test]
    fn test_resolve_too_short() {
        assert!(matches!(resolve("1234", &registry()), Err(Error::InvalidAddress { .. })));
    }

    #[test]
    fn test_load_missing() {
        let err = Registry::load(&PathBuf::from("/nonexistent/oui.txt")).unwrap_err();
        assert!(matches!(err, Error::RegistryUnavailable { .. }));
    }

    #[test]
    fn test_load_fixture() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/oui.txt");
        assert_eq!(Registry::load(&path).unwrap().len(), 5);
    }
}
