// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Device capacity in decimal and binary gigabytes

use std::fmt;

use serde::{Serialize, Serializer};

/// Sysfs `size` attributes are always in 512-byte sectors.
pub const SECTOR_SIZE: u64 = 512;

/// Storage unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum StorageUnit {
    /// Gigabytes
    Gigabytes = 1_000_000_000,
    /// Gibibytes
    Gibibytes = 1024 * 1024 * 1024,
}

impl fmt::Display for StorageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageUnit::Gigabytes => f.write_str("GB"),
            StorageUnit::Gibibytes => f.write_str("GiB"),
        }
    }
}

/// A quantity with one decimal place, held as an integer count of tenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tenths(u64);

impl Tenths {
    /// Converts `bytes` to `unit`, rounding half up to one decimal place.
    pub fn of(bytes: u64, unit: StorageUnit) -> Self {
        let divisor = unit as u128;
        let tenths = (bytes as u128 * 10 + divisor / 2) / divisor;
        Self(tenths as u64)
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl Serialize for Tenths {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Capacity of a device's block layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    Known { sectors: u64, gb: Tenths, gib: Tenths },
    /// No block device, or its size attribute could not be read
    Unreadable,
}

impl Capacity {
    pub fn from_sectors(sectors: u64) -> Self {
        let bytes = sectors.saturating_mul(SECTOR_SIZE);
        Self::Known {
            sectors,
            gb: Tenths::of(bytes, StorageUnit::Gigabytes),
            gib: Tenths::of(bytes, StorageUnit::Gibibytes),
        }
    }
}

impl From<Option<u64>> for Capacity {
    fn from(sectors: Option<u64>) -> Self {
        sectors.map_or(Self::Unreadable, Self::from_sectors)
    }
}
