// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Oracle ASM disk identification
//!
//! ASM disks on these hosts are named by udev rules matching the disk WWID,
//! e.g.
//!
//! ```text
//! KERNEL=="sd?1", PROGRAM=="/usr/lib/udev/scsi_id -g -u -d /dev/$parent",
//!     RESULT=="36000c29...", SYMLINK+="oracleasm/asm_data01p1", OWNER="grid"
//! ```
//!
//! Disk group membership comes from the running ASM instance.

use std::{collections::HashMap, sync::OnceLock};

use regex::Regex;
use serde::Serialize;

static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();
static SUFFIX_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Query run against the ASM instance, one row per disk:
/// `<path> <header status> <disk group or -> <total MB>`.
pub const DISK_QUERY: &str = "set pagesize 0 feedback off heading off linesize 400 trimspool on
select d.path || ' ' || d.header_status || ' ' || nvl(g.name, '-') || ' ' || d.total_mb
  from v$asm_disk d left join v$asm_diskgroup g on d.group_number = g.group_number;
exit
";

/// Strips a trailing partition suffix (`p1`) from an ASM device name. The
/// suffix only counts when it follows a digit, so `asm_temp1` is kept whole.
pub fn strip_partition(name: &str) -> &str {
    let suffix =
        SUFFIX_PATTERN.get_or_init(|| Regex::new(r"[0-9]p[0-9]+$").expect("Failed to initialise known-working regex"));
    match suffix.find(name) {
        Some(m) => &name[..m.start() + 1],
        None => name,
    }
}

/// Last component of a device path (`/dev/oracleasm/x`, `ORCL:x`).
fn basename(path: &str) -> &str {
    path.rsplit(['/', ':']).next().unwrap_or(path)
}

/// A rule line naming an ASM device.
#[derive(Debug, Clone)]
struct NamedRule {
    line: String,
    name: String,
}

/// ASM device names assigned by the udev rules file.
///
/// A device belongs to the first rule line that mentions its WWID, whatever
/// key carries it (`RESULT`, `ENV{ID_SERIAL}`, `ENV{ID_SERIAL_SHORT}`,
/// `ENV{DM_UUID}=="mpath-<wwid>"`).
#[derive(Debug, Clone, Default)]
pub struct AsmRules {
    rules: Vec<NamedRule>,
}

impl AsmRules {
    /// Parses udev rules text. Comment lines and rules that do not assign a
    /// device name are ignored.
    pub fn parse(text: &str) -> Self {
        let names = NAME_PATTERN.get_or_init(|| {
            Regex::new(r#"\b(?:SYMLINK|NAME)\s*\+?=\s*"([^"]*)""#).expect("Failed to initialise known-working regex")
        });

        let rules = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let name = names.captures(line)?.get(1)?.as_str();
                let name = strip_partition(basename(name));
                (!name.is_empty()).then(|| NamedRule {
                    line: line.to_owned(),
                    name: name.to_owned(),
                })
            })
            .collect();

        Self { rules }
    }

    /// ASM device name assigned to `wwid`.
    pub fn device_for(&self, wwid: &str) -> Option<&str> {
        if wwid.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.line.contains(wwid))
            .map(|rule| rule.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// One disk as reported by the ASM instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsmDisk {
    /// ASM device name, partition suffix stripped
    pub name: String,
    /// Header status, e.g. `MEMBER`, `CANDIDATE`, `FORMER`
    pub status: String,
    /// Owning disk group, absent for disks not mounted in a group
    pub group: Option<String>,
    /// Size in MB
    pub size_mb: u64,
}

/// Disks listed by the ASM instance, keyed by device name.
#[derive(Debug, Clone, Default)]
pub struct AsmDisks {
    by_name: HashMap<String, AsmDisk>,
}

impl AsmDisks {
    /// Parses the output of [`DISK_QUERY`]. Rows that do not have four
    /// fields, or whose size is not a number, are skipped.
    pub fn parse(text: &str) -> Self {
        let by_name = text
            .lines()
            .filter_map(|line| {
                let fields: Vec<_> = line.split_whitespace().collect();
                let &[path, status, group, size] = fields.as_slice() else {
                    return None;
                };
                let disk = AsmDisk {
                    name: strip_partition(basename(path)).to_owned(),
                    status: status.to_owned(),
                    group: (group != "-").then(|| group.to_owned()),
                    size_mb: size.parse().ok()?,
                };
                Some((disk.name.clone(), disk))
            })
            .collect();

        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&AsmDisk> {
        self.by_name.get(name)
    }
}

/// ASM instance SID from a process name such as `asm_pmon_+ASM1`.
pub fn instance_from_process(comm: &str) -> Option<&str> {
    comm.trim().strip_prefix("asm_pmon_").filter(|sid| !sid.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = include_str!("../tests/fixtures/99-oracle-asmdevices.rules");

    #[test]
    fn test_strip_partition() {
        assert_eq!(strip_partition("asm_data01p1"), "asm_data01");
        assert_eq!(strip_partition("asm_data01"), "asm_data01");
        assert_eq!(strip_partition("asmdisk12"), "asmdisk12");
        assert_eq!(strip_partition("p1"), "p1");
        assert_eq!(strip_partition("asm_temp1"), "asm_temp1");
        assert_eq!(strip_partition("asm_bkp2"), "asm_bkp2");
        assert_eq!(strip_partition("asmdisk3p12"), "asmdisk3");
    }

    #[test]
    fn test_parse_rules() {
        let rules = AsmRules::parse(RULES);
        assert_eq!(rules.device_for("36000c29a5f3e8b7c1d2e4f6a8b0c2d4e"), Some("asm_data01"));
        assert_eq!(rules.device_for("36000c2917c4b2a9e0d8f3a1b5c6d7e8f"), Some("asm_fra01"));
    }

    #[test]
    fn test_rules_match_any_key() {
        let rules = AsmRules::parse(RULES);
        assert_eq!(rules.device_for("36000c29b1d2c3e4f5a6b7c8d9e0f1a2b"), Some("asm_data02"));
        assert_eq!(rules.device_for("36000c29c0ffee0123456789abcdef012"), Some("asm_redo01"));
        assert_eq!(rules.device_for("36000c29d4c3b2a1f0e9d8c7b6a5f4e3d"), Some("asm_temp1"));
    }

    #[test]
    fn test_rules_without_name() {
        let rules = AsmRules::parse(r#"KERNEL=="sd*", RESULT=="36000c29aaaa", OWNER="grid""#);
        assert!(rules.is_empty());
        assert_eq!(rules.device_for(""), None);
    }

    #[test]
    fn test_rules_ignore_comments() {
        let rules = AsmRules::parse(RULES);
        // Only present in a commented-out rule
        assert_eq!(rules.device_for("36000c29ffffffffffffffffffffffff0"), None);
    }

    #[test]
    fn test_empty_rules() {
        assert!(AsmRules::parse("").is_empty());
        assert!(AsmRules::parse("# nothing here\n").is_empty());
    }

    #[test]
    fn test_parse_disks() {
        let disks = AsmDisks::parse(
            "/dev/oracleasm/asm_data01p1 MEMBER DATA 10239\n\
             /dev/oracleasm/asm_spare01p1 CANDIDATE - 5119\n\
             garbage line\n",
        );
        let data = disks.get("asm_data01").unwrap();
        assert_eq!(data.group.as_deref(), Some("DATA"));
        assert_eq!(data.status, "MEMBER");
        assert_eq!(data.size_mb, 10239);
        assert_eq!(disks.get("asm_spare01").unwrap().group, None);
        assert!(disks.get("garbage").is_none());
    }

    #[test]
    fn test_instance_from_process() {
        assert_eq!(instance_from_process("asm_pmon_+ASM1\n"), Some("+ASM1"));
        assert_eq!(instance_from_process("ora_pmon_ORCL"), None);
        assert_eq!(instance_from_process("asm_pmon_"), None);
    }
}
