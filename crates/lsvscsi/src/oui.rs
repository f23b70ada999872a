// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! `oui` subcommand

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use log::{debug, warn};
use nix::sys::signal::{SigSet, Signal};
use wwn::{download, Registry, Resolution};

/// Registry shipped by the hwdata package.
const SYSTEM_REGISTRY: &str = "/usr/share/hwdata/oui.txt";

/// Registry kept in the working directory, and where `--update` writes.
const LOCAL_REGISTRY: &str = "oui.txt";

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// The registry to read: a downloaded copy in the working directory, else
/// the system registry if installed.
pub fn default_registry() -> PathBuf {
    pick_registry(Path::new(LOCAL_REGISTRY), Path::new(SYSTEM_REGISTRY))
}

fn pick_registry(local: &Path, system: &Path) -> PathBuf {
    if !local.exists() && system.exists() {
        system.to_owned()
    } else {
        local.to_owned()
    }
}

/// Where `--update` writes. The system registry belongs to its package and
/// is only replaced when named explicitly.
pub fn update_target(registry: Option<PathBuf>) -> PathBuf {
    registry.unwrap_or_else(|| PathBuf::from(LOCAL_REGISTRY))
}

/// Routes SIGINT and SIGTERM to a watcher thread. The first signal raises
/// the cancel flag, a second one exits at once.
fn watch_signals() -> nix::Result<()> {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.thread_block()?;

    thread::spawn(move || {
        let mut received = 0;
        loop {
            match mask.wait() {
                Ok(signal) if received == 0 => {
                    warn!("received {signal}, cancelling download");
                    CANCELLED.store(true, Ordering::Relaxed);
                    received += 1;
                }
                Ok(signal) => {
                    warn!("received {signal} again, exiting");
                    process::exit(130);
                }
                Err(e) => {
                    debug!("signal watcher failed: {e}");
                    return;
                }
            }
        }
    });
    Ok(())
}

/// Refreshes the registry at `target` from `url`.
pub fn update(url: &str, target: &Path) -> Result<Registry, wwn::Error> {
    if let Err(e) = watch_signals() {
        warn!("cannot watch for termination signals: {e}");
    }
    download::fetch(url, target, &CANCELLED)
}

/// Writes the resolution as `field: value` lines.
pub fn write_report<W: Write>(w: &mut W, res: &Resolution) -> io::Result<()> {
    writeln!(w, "{:<8}: {}", "address", res.address)?;
    writeln!(w, "{:<8}: {}", "class", res.kind)?;
    writeln!(w, "{:<8}: {}", "format", res.format)?;
    match &res.oui {
        Some(oui) => writeln!(w, "{:<8}: {}", "oui", oui)?,
        None => writeln!(w, "{:<8}: OUI unknown", "oui")?,
    }
    writeln!(w, "{:<8}: {}", "vendor", res.vendor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report() {
        let registry = Registry::parse("00-50-76   (hex)\t\tIBM Corp\n");
        let res = wwn::resolve("50:05:07:68:0c:51:1e:1a", &registry).unwrap();

        let mut out = Vec::new();
        write_report(&mut out, &res).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "address : 500507680C511E1A\nclass   : WWN\nformat  : NAA 5 (IEEE registered)\noui     : 005076\nvendor  : IBM Corp\n"
        );
    }

    #[test]
    fn test_update_never_defaults_to_system_registry() {
        assert_eq!(update_target(None), PathBuf::from("oui.txt"));
        assert_ne!(update_target(None), PathBuf::from(SYSTEM_REGISTRY));
        assert_eq!(
            update_target(Some(PathBuf::from(SYSTEM_REGISTRY))),
            PathBuf::from(SYSTEM_REGISTRY)
        );
    }

    #[test]
    fn test_pick_registry() {
        let dir = std::env::temp_dir().join(format!("lsvscsi-registry-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let local = dir.join("oui.txt");
        let system = dir.join("hwdata-oui.txt");
        let _ = std::fs::remove_file(&local);

        // Neither exists: the local path is reported as missing
        assert_eq!(pick_registry(&local, &system), local);

        std::fs::write(&system, "00-0C-29   (hex)\t\tVMware, Inc.\n").unwrap();
        assert_eq!(pick_registry(&local, &system), system);

        std::fs::write(&local, "00-0C-29   (hex)\t\tVMware, Inc.\n").unwrap();
        assert_eq!(pick_registry(&local, &system), local);
    }

    #[test]
    fn test_report_unknown() {
        let res = wwn::resolve("9000000000000000", &Registry::default()).unwrap();
        let mut out = Vec::new();
        write_report(&mut out, &res).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("oui     : OUI unknown\n"));
        assert!(out.ends_with("vendor  : vendor unknown\n"));
    }
}
