// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Registry refresh
//!
//! The registry is fetched into `<target>.part` and only renamed over the
//! target once it parses. An interrupted or failed refresh leaves the
//! previous registry untouched. The transfer runs on a worker thread while
//! the caller polls a cancel flag, so a stalled connection never holds up
//! cancellation and the partial file is removed by its guard on every path.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::Duration,
};

use log::{debug, info, warn};

use crate::{registry::Registry, Error};

/// Published IEEE MA-L assignments.
pub const DEFAULT_URL: &str = "https://standards-oui.ieee.org/oui/oui.txt";

/// Upper bound on the downloaded body.
const BODY_LIMIT: u64 = 64 * 1024 * 1024;

const CHUNK_SIZE: usize = 64 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// How often a running download checks for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A partially written file, removed on drop unless committed.
#[derive(Debug)]
pub struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    /// Creates the partial file next to `target`, removing a stale one first.
    pub fn create(target: &Path) -> Result<(Self, File), Error> {
        let path = partial_path(target);
        match fs::remove_file(&path) {
            Ok(()) => debug!("removed stale {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = File::create(&path)?;
        Ok((Self { path, committed: false }, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the partial file over `target`.
    pub fn commit(mut self, target: &Path) -> Result<(), Error> {
        fs::rename(&self.path, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("cannot remove {}: {e}", self.path.display());
            }
        }
    }
}

/// Where the download for `target` is staged.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(OsString::from(".part"));
    PathBuf::from(name)
}

/// Copies `reader` into `writer` until EOF, stopping early once `cancel` is set.
fn copy_until_cancelled(reader: &mut impl Read, writer: &mut impl Write, cancel: &AtomicBool) -> Result<u64, Error> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Loads the finished partial file and moves it over `target` if it holds
/// a usable registry.
fn finish(partial: PartialFile, target: &Path) -> Result<Registry, Error> {
    let registry = Registry::load(partial.path())?;
    partial.commit(target)?;

    info!("installed {} OUI assignments to {}", registry.len(), target.display());
    Ok(registry)
}

/// Writes everything `reader` yields to `target` through a partial file,
/// replacing `target` only if the result is a usable registry.
pub fn install(reader: &mut impl Read, target: &Path, cancel: &AtomicBool) -> Result<Registry, Error> {
    let (partial, file) = PartialFile::create(target)?;

    let mut writer = BufWriter::new(file);
    let bytes = copy_until_cancelled(reader, &mut writer, cancel)?;
    writer.flush()?;
    drop(writer);
    debug!("wrote {bytes} bytes to {}", partial.path().display());

    finish(partial, target)
}

/// Streams the body behind `url` into `file`.
fn transfer(url: &str, file: File, cancel: &AtomicBool) -> Result<u64, Error> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_connect(Some(CONNECT_TIMEOUT))
        .timeout_recv_response(Some(RESPONSE_TIMEOUT))
        .build()
        .into();

    let mut response = agent.get(url).call()?;
    let mut reader = response.body_mut().with_config().limit(BODY_LIMIT).reader();
    let mut writer = BufWriter::new(file);
    let bytes = copy_until_cancelled(&mut reader, &mut writer, cancel)?;
    writer.flush()?;
    Ok(bytes)
}

/// Downloads the registry from `url` and installs it at `target`.
///
/// Returns [`Error::Cancelled`] within [`POLL_INTERVAL`] of `cancel` being
/// set, even while the connection is stalled. The partial file is gone by
/// then; the abandoned transfer only holds its unlinked file handle.
pub fn fetch(url: &str, target: &Path, cancel: &'static AtomicBool) -> Result<Registry, Error> {
    info!("downloading OUI registry from {url}");
    let (partial, file) = PartialFile::create(target)?;

    let (tx, rx) = mpsc::channel();
    let url = url.to_owned();
    thread::spawn(move || {
        // The receiver is gone once the download was cancelled
        let _ = tx.send(transfer(&url, file, cancel));
    });

    let bytes = loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(result) => break result?,
            Err(RecvTimeoutError::Timeout) if cancel.load(Ordering::Relaxed) => {
                warn!("download cancelled, removing {}", partial.path().display());
                return Err(Error::Cancelled);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io::Error::other("download worker exited unexpectedly").into());
            }
        }
    };
    debug!("wrote {bytes} bytes to {}", partial.path().display());

    finish(partial, target)
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, net::TcpListener};

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wwn-download-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join("oui.txt")
    }

    #[test_log::test]
    fn test_install() {
        let target = scratch("install");
        let mut body = Cursor::new(include_str!("../tests/fixtures/oui.txt"));

        let registry = install(&mut body, &target, &AtomicBool::new(false)).unwrap();
        assert_eq!(registry.len(), 5);
        assert!(target.exists());
        assert!(!partial_path(&target).exists());
    }

    #[test_log::test]
    fn test_invalid_body_keeps_previous() {
        let target = scratch("invalid");
        fs::write(&target, "00-0C-29   (hex)\t\tVMware, Inc.\n").unwrap();
        let mut body = Cursor::new("<html>maintenance</html>");

        let err = install(&mut body, &target, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, Error::EmptyRegistry(_)));
        assert_eq!(Registry::load(&target).unwrap().len(), 1);
        assert!(!partial_path(&target).exists());
    }

    #[test_log::test]
    fn test_cancelled_leaves_nothing() {
        let target = scratch("cancelled");
        let mut body = Cursor::new(include_str!("../tests/fixtures/oui.txt"));

        let err = install(&mut body, &target, &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
    }

    #[test_log::test]
    fn test_cancel_stalled_download() {
        static CANCEL: AtomicBool = AtomicBool::new(false);

        let target = scratch("stalled");
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/oui.txt", listener.local_addr().unwrap());

        // Sends the headers and one entry, then never finishes the body
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1048576\r\n\r\n00-0C-29   (hex)\t\tVMware, Inc.\n")
                .unwrap();
            stream.flush().unwrap();
            thread::sleep(Duration::from_secs(60));
        });
        thread::spawn(|| {
            thread::sleep(Duration::from_millis(500));
            CANCEL.store(true, Ordering::Relaxed);
        });

        let err = fetch(&url, &target, &CANCEL).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!partial_path(&target).exists());
        assert!(!target.exists());
    }

    #[test]
    fn test_stale_partial_removed() {
        let target = scratch("stale");
        fs::write(partial_path(&target), "leftover").unwrap();

        let (partial, mut file) = PartialFile::create(&target).unwrap();
        file.write_all(b"fresh").unwrap();
        assert_eq!(fs::read_to_string(partial.path()).unwrap(), "fresh");

        drop(partial);
        assert!(!partial_path(&target).exists());
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(partial_path(Path::new("/tmp/oui.txt")), PathBuf::from("/tmp/oui.txt.part"));
    }
}
