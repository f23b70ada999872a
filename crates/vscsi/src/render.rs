// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Text renderings of inventory results

use std::io::{self, Write};

use itertools::Itertools;

use crate::{
    capacity::Capacity,
    controller::ControllerMap,
    record::{AsmEnrichment, BlockDevice, Classification, DeviceRecord, Wwid},
};

pub const NO_BLOCK: &str = "no-block";
pub const NO_WWID: &str = "no-wwid";
pub const UNCLASSIFIED: &str = "-";
pub const CAPACITY_ERROR: &str = "error";
pub const ASM_DOWN: &str = "asm-down";

const COLUMNS: &[&str] = &[
    "hostname",
    "scsi_address",
    "vmware_address",
    "vendor",
    "model",
    "generic",
    "block",
    "wwid",
    "multipath",
    "storage",
    "member_of",
    "asm_group",
    "size_gb",
    "size_gib",
];

/// How device records are written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// One `field: value` block per device
    Verbose,
    /// Comma separated rows, optionally preceded by a header pair
    Csv { header: bool },
    /// Aligned columns
    Table,
    Json,
}

impl RecordFormat {
    /// Whether records are presented sorted by address.
    pub fn sorted(&self) -> bool {
        !matches!(self, RecordFormat::Verbose)
    }
}

/// Writes `records` to `w` in `format`.
pub fn write_records<W: Write>(w: &mut W, records: &[DeviceRecord], format: RecordFormat) -> io::Result<()> {
    match format {
        RecordFormat::Verbose => write_verbose(w, records),
        RecordFormat::Csv { header } => write_csv(w, records, header),
        RecordFormat::Table => write_table(w, records),
        RecordFormat::Json => {
            serde_json::to_writer_pretty(&mut *w, records)?;
            writeln!(w)
        }
    }
}

fn storage_cells(classification: &Classification) -> [String; 3] {
    match classification {
        Classification::Asm { disk, enrichment } => {
            let group = match enrichment {
                AsmEnrichment::NotRequested => UNCLASSIFIED.to_owned(),
                AsmEnrichment::InstanceDown => ASM_DOWN.to_owned(),
                AsmEnrichment::NotListed => UNCLASSIFIED.to_owned(),
                AsmEnrichment::Listed(d) => d.group.clone().unwrap_or_else(|| d.status.clone()),
            };
            ["ASM".to_owned(), disk.clone(), group]
        }
        Classification::Lvm { volume_group } => ["LVM".to_owned(), volume_group.clone(), UNCLASSIFIED.to_owned()],
        Classification::Unclassified => [UNCLASSIFIED.to_owned(), UNCLASSIFIED.to_owned(), UNCLASSIFIED.to_owned()],
    }
}

fn capacity_cells(capacity: &Capacity) -> [String; 2] {
    match capacity {
        Capacity::Known { gb, gib, .. } => [gb.to_string(), gib.to_string()],
        Capacity::Unreadable => [CAPACITY_ERROR.to_owned(), CAPACITY_ERROR.to_owned()],
    }
}

fn cells(record: &DeviceRecord) -> Vec<String> {
    let [storage, member_of, asm_group] = storage_cells(&record.classification);
    let [gb, gib] = capacity_cells(&record.capacity);

    vec![
        record.hostname.clone(),
        record.address.to_string(),
        record.virtual_address.to_string(),
        record.vendor.clone().unwrap_or_default(),
        record.model.clone().unwrap_or_default(),
        record.generic.clone().unwrap_or_default(),
        match &record.block {
            BlockDevice::Bound(name) => name.clone(),
            BlockDevice::Unbound => NO_BLOCK.to_owned(),
        },
        match &record.wwid {
            Wwid::Known(wwid) => wwid.clone(),
            Wwid::Unavailable => NO_WWID.to_owned(),
        },
        record.multipath.clone().unwrap_or_else(|| UNCLASSIFIED.to_owned()),
        storage,
        member_of,
        asm_group,
        gb,
        gib,
    ]
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

fn write_csv<W: Write>(w: &mut W, records: &[DeviceRecord], header: bool) -> io::Result<()> {
    if header {
        writeln!(w, "{}", COLUMNS.join(","))?;
        writeln!(w, "{}", COLUMNS.iter().map(|c| "-".repeat(c.len())).join(","))?;
    }

    for record in records {
        writeln!(w, "{}", cells(record).iter().map(|c| csv_escape(c)).join(","))?;
    }

    Ok(())
}

fn write_table<W: Write>(w: &mut W, records: &[DeviceRecord]) -> io::Result<()> {
    let rows: Vec<Vec<String>> = records.iter().map(cells).collect();
    let widths: Vec<usize> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, name)| rows.iter().map(|r| r[i].len()).chain([name.len()]).max().unwrap_or(0))
        .collect();

    let line = |cells: &[&str]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .join("  ")
            .trim_end()
            .to_owned()
    };

    writeln!(w, "{}", line(COLUMNS))?;
    for row in &rows {
        let row: Vec<&str> = row.iter().map(String::as_str).collect();
        writeln!(w, "{}", line(&row))?;
    }

    Ok(())
}

fn write_verbose<W: Write>(w: &mut W, records: &[DeviceRecord]) -> io::Result<()> {
    for (n, record) in records.iter().enumerate() {
        if n > 0 {
            writeln!(w)?;
        }

        let cells = cells(record);
        for (name, value) in COLUMNS.iter().zip(&cells) {
            writeln!(w, "{name:<15}: {value}")?;
        }

        if let Classification::Asm {
            enrichment: AsmEnrichment::Listed(disk),
            ..
        } = &record.classification
        {
            writeln!(w, "{:<15}: {}", "asm_status", disk.status)?;
            writeln!(w, "{:<15}: {}", "asm_size_mb", disk.size_mb)?;
        }
    }

    Ok(())
}

/// Writes the controller map as aligned columns.
pub fn write_controllers<W: Write>(w: &mut W, map: &ControllerMap) -> io::Result<()> {
    writeln!(w, "{:<10} {:<14} {:<8} {:<6} DESCRIPTION", "CONTROLLER", "PCI", "IO_PORT", "HOST")?;
    for mapped in map.controllers() {
        let io_port = mapped.controller.io_port.map(|p| format!("{p:#06x}")).unwrap_or_default();
        writeln!(
            w,
            "{:<10} {:<14} {:<8} {:<6} {}",
            format!("SCSI({})", mapped.index),
            mapped.controller.address,
            io_port,
            format!("host{}", mapped.host),
            mapped.controller.description,
        )?;
    }
    Ok(())
}
