// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SCSI device addressing
//!
//! The kernel names every SCSI device after its `host:bus:target:lun` tuple,
//! e.g. `/sys/bus/scsi/devices/2:0:1:0`.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::Error;

/// A kernel SCSI address (H:B:T:L).
///
/// Ordering is lexicographic over the tuple, which is the order sorted
/// output is presented in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ScsiAddress {
    pub host: u32,
    pub bus: u32,
    pub target: u32,
    pub lun: u64,
}

impl ScsiAddress {
    pub fn new(host: u32, bus: u32, target: u32, lun: u64) -> Self {
        Self { host, bus, target, lun }
    }
}

impl fmt::Display for ScsiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.host, self.bus, self.target, self.lun)
    }
}

impl FromStr for ScsiAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidAddress(s.to_owned());

        let mut fields = s.split(':');
        let host = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let bus = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let target = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let lun = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;

        if fields.next().is_some() {
            return Err(invalid());
        }

        Ok(Self { host, bus, target, lun })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let addr: ScsiAddress = "2:0:13:0".parse().unwrap();
        assert_eq!(addr, ScsiAddress::new(2, 0, 13, 0));
        assert_eq!(addr.to_string(), "2:0:13:0");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "1:2:3", "1:2:3:4:5", "host0", "a:b:c:d", "-1:0:0:0", "1::0:0"] {
            assert!(bad.parse::<ScsiAddress>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_ordering() {
        let mut addrs: Vec<ScsiAddress> = ["3:0:0:0", "2:0:10:0", "2:0:2:0", "2:0:2:1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        addrs.sort();
        let sorted: Vec<String> = addrs.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, ["2:0:2:0", "2:0:2:1", "2:0:10:0", "3:0:0:0"]);
    }
}
