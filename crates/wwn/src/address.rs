// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! WWN and WWID parsing
//!
//! Port and node names (WWNs) and SCSI device identifiers (WWIDs) embed the
//! IEEE OUI of the vendor that minted them. Where it sits depends on the
//! Name Address Authority (NAA) format selected by the leading digits.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::Error;

/// Shortest accepted address, in hex digits.
pub const MIN_DIGITS: usize = 16;

/// Digits in a WWN.
const WWN_DIGITS: usize = 16;

/// Digits in an IBM XIV style WWID.
const XIV_DIGITS: usize = 17;

/// What kind of identifier an address is, judged by its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// 16 digit port or node name
    Wwn,
    /// 17 digit IBM XIV volume identifier
    XivWwid,
    /// Any other device identifier
    Wwid,
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKind::Wwn => f.write_str("WWN"),
            AddressKind::XivWwid => f.write_str("XIV WWID"),
            AddressKind::Wwid => f.write_str("WWID"),
        }
    }
}

/// Layout the OUI was extracted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// NAA 1, `1000` followed by the OUI
    IeeeStandard,
    /// NAA 2, vendor specific digits before the OUI
    IeeeExtended,
    /// NAA 5, OUI right after the NAA digit
    IeeeRegistered,
    /// NAA 6 style identifier as used by SVC and VMware
    SvcWwid,
    /// As [`Format::SvcWwid`] with the leading `3` added by the kernel
    SvcWwidPrefixed,
    /// IBM XIV volume identifier
    Xiv,
    Unknown,
}

impl Format {
    /// Hex digit range holding the OUI.
    fn oui_range(&self) -> Option<std::ops::Range<usize>> {
        match self {
            Format::IeeeStandard | Format::IeeeExtended => Some(4..10),
            Format::IeeeRegistered | Format::SvcWwid | Format::Xiv => Some(1..7),
            Format::SvcWwidPrefixed => Some(2..8),
            Format::Unknown => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::IeeeStandard => f.write_str("NAA 1 (IEEE standard)"),
            Format::IeeeExtended => f.write_str("NAA 2 (IEEE extended)"),
            Format::IeeeRegistered => f.write_str("NAA 5 (IEEE registered)"),
            Format::SvcWwid => f.write_str("SVC/VMware WWID"),
            Format::SvcWwidPrefixed => f.write_str("SVC/VMware WWID (kernel prefixed)"),
            Format::Xiv => f.write_str("XIV WWID"),
            Format::Unknown => f.write_str("unknown"),
        }
    }
}

/// A 24-bit IEEE Organizationally Unique Identifier, as six upper-case hex
/// digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Oui(String);

impl Oui {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Oui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Oui {
    type Err = Error;

    /// Accepts `005076`, `00-50-76` and `00:50:76`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = normalize(s);
        if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(digits))
        } else {
            Err(Error::InvalidAddress {
                input: s.to_owned(),
                reason: "an OUI is six hex digits",
            })
        }
    }
}

/// Strips separators and an optional `0x` prefix, and upper-cases.
///
/// Normalizing an already normalized string returns it unchanged.
pub fn normalize(input: &str) -> String {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    trimmed
        .chars()
        .filter(|c| !matches!(c, ':' | '.' | '-' | ' ' | '\t'))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// A validated, normalized WWN or WWID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    digits: String,
    kind: AddressKind,
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = normalize(s);
        let invalid = |reason| Error::InvalidAddress {
            input: s.to_owned(),
            reason,
        };

        if digits.len() < MIN_DIGITS {
            return Err(invalid("shorter than 16 hex digits"));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("not hexadecimal"));
        }

        let kind = match digits.len() {
            WWN_DIGITS => AddressKind::Wwn,
            XIV_DIGITS if digits.starts_with('2') => AddressKind::XivWwid,
            _ => AddressKind::Wwid,
        };

        Ok(Self { digits, kind })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digits)
    }
}

impl Address {
    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// NAA layout, chosen by the leading digits.
    pub fn format(&self) -> Format {
        if self.kind == AddressKind::XivWwid {
            return Format::Xiv;
        }

        let d = self.digits.as_str();
        if d.starts_with("1000") {
            Format::IeeeStandard
        } else if d.starts_with("36") {
            Format::SvcWwidPrefixed
        } else if d.starts_with('2') {
            Format::IeeeExtended
        } else if d.starts_with('5') {
            Format::IeeeRegistered
        } else if d.starts_with('6') {
            Format::SvcWwid
        } else {
            Format::Unknown
        }
    }

    /// The embedded OUI, `None` when the layout is not known.
    pub fn oui(&self) -> Option<Oui> {
        let range = self.format().oui_range()?;
        self.digits.get(range).map(|digits| Oui(digits.to_owned()))
    }
}
