//! # File-backed TOC cache
//!
//! Connecting to a Crazyflie downloads the table of content (TOC) of the log and param subsystems, which takes a
//! noticeable part of the connection time. The SDK identifies each TOC by its CRC32 and lets the application keep
//! them through the [TocCache] trait.
//!
//! [FileTocCache] keeps one file per TOC in a directory so that the next run of either flight program connects
//! faster. A cache that cannot be read or written only costs a slower connection, so errors are logged and ignored.

use crazyflie_lib::TocCache;
use std::path::{Path, PathBuf};

/// TOC cache storing each TOC as `<crc32>.json` in a directory
#[derive(Debug, Clone)]
pub struct FileTocCache {
    dir: PathBuf,
}

impl FileTocCache {
    /// Create a cache in `dir`. The directory is created on the first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, crc32: u32) -> PathBuf {
        self.dir.join(format!("{:08x}.json", crc32))
    }
}

impl TocCache for FileTocCache {
    fn get_toc(&self, crc32: u32) -> Option<String> {
        let path = self.entry_path(crc32);
        match std::fs::read_to_string(&path) {
            Ok(toc) => {
                log::debug!("TOC {:08x} loaded from {}", crc32, path.display());
                Some(toc)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Cannot read cached TOC {}: {}", path.display(), e);
                None
            }
        }
    }

    fn store_toc(&self, crc32: u32, toc: &str) {
        let path = self.entry_path(crc32);
        let result = std::fs::create_dir_all(&self.dir).and_then(|_| std::fs::write(&path, toc));
        match result {
            Ok(()) => log::debug!("TOC {:08x} stored in {}", crc32, path.display()),
            Err(e) => log::warn!("Cannot store TOC in {}: {}", path.display(), e),
        }
    }
}
