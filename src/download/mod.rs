//! Resource downloading with cache-aware integrity checks.
//!
//! A [`DownloadResource`] maps to a deterministic archive path under a shared
//! download directory. Downloads are conditional and idempotent: if the
//! cached archive already passes the integrity check (exists, size matches,
//! checksum matches) no transfer is issued at all. A partial file is resumed;
//! an oversized file is deleted and re-downloaded; any other stat failure is
//! fatal. Abandoned transfers are safe to retry because the cache layout and
//! partial-file semantics are deterministic.

mod checksums;

pub use checksums::{
    Checksum, ChecksumAlgorithm, DIR_MANIFEST_FILE, check_dir_checksum, compute_dir_checksum,
    write_dir_manifest,
};

use crate::errors::{Error, Result};
use crate::progress::{DownloadProgress, DownloadProgressFn};
use log::{debug, info};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How often download progress callbacks fire.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// A remote archive plus everything needed to verify and cache it locally.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResource {
    pub url: String,
    /// `"ALGO:HEXDIGEST"`, see [`Checksum`].
    pub checksum: String,
    /// Expected archive size in bytes.
    pub size: u64,
    /// Sub-path under the shared download directory.
    pub cache_path: String,
    pub archive_file_name: String,
}

/// Outcome of a conditional download. `AlreadyCached` is the "nil transfer
/// handle" signal: the integrity check passed and nothing was transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    AlreadyCached,
    /// Bytes actually transferred in this call.
    Downloaded(u64),
}

/// What the resume policy decided to do with the local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPlan {
    /// Cached archive passed the integrity check.
    NoTransfer,
    /// Missing (or oversized and removed): download from scratch.
    Start,
    /// Partial file present: resume from this byte offset.
    Resume(u64),
}

/// The default per-user download directory.
pub fn default_download_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".bric").join("downloads"))
}

impl DownloadResource {
    /// The deterministic archive path under `download_dir`. Creates the
    /// staging sub-directory if needed.
    pub fn archive_path(&self, download_dir: &Path) -> Result<PathBuf> {
        let staging = download_dir.join(&self.cache_path);
        fs::create_dir_all(&staging)?;
        Ok(staging.join(&self.archive_file_name))
    }

    pub fn is_cached(&self, download_dir: &Path) -> Result<bool> {
        Ok(self.archive_path(download_dir)?.exists())
    }

    pub fn test_local_archive_size(&self, download_dir: &Path) -> Result<bool> {
        let info = fs::metadata(self.archive_path(download_dir)?)?;
        Ok(info.len() == self.size)
    }

    pub fn test_local_archive_checksum(&self, download_dir: &Path) -> Result<bool> {
        let checksum: Checksum = self.checksum.parse()?;
        checksum.matches_file(&self.archive_path(download_dir)?)
    }

    /// Cached ∧ size matches ∧ checksum matches.
    pub fn test_local_archive_integrity(&self, download_dir: &Path) -> Result<bool> {
        if !self.is_cached(download_dir)? {
            return Ok(false);
        }
        if !self.test_local_archive_size(download_dir)? {
            return Ok(false);
        }
        self.test_local_archive_checksum(download_dir)
    }

    /// Decide what a download would have to do, without transferring.
    pub fn transfer_plan(&self, download_dir: &Path) -> Result<TransferPlan> {
        if self.test_local_archive_integrity(download_dir)? {
            return Ok(TransferPlan::NoTransfer);
        }
        let path = self.archive_path(download_dir)?;
        match fs::metadata(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TransferPlan::Start),
            Err(e) => Err(e.into()),
            Ok(stat) if stat.len() > self.size => {
                // bigger than expected: corrupted, retry from scratch
                debug!("removing oversized archive {}", path.display());
                fs::remove_file(&path)?;
                Ok(TransferPlan::Start)
            }
            Ok(stat) => Ok(TransferPlan::Resume(stat.len())),
        }
    }

    /// Conditionally download the resource, reporting progress roughly every
    /// 250 ms on the caller's thread. Returns [`Fetched::AlreadyCached`] when
    /// the cached archive already passes the integrity check.
    pub fn download(
        &self,
        download_dir: &Path,
        label: &str,
        progress: &mut DownloadProgressFn<'_>,
    ) -> Result<Fetched> {
        let plan = self.transfer_plan(download_dir)?;
        let offset = match plan {
            TransferPlan::NoTransfer => {
                debug!("{} already cached, nothing to do", self.archive_file_name);
                return Ok(Fetched::AlreadyCached);
            }
            TransferPlan::Start => 0,
            TransferPlan::Resume(offset) => offset,
        };

        let path = self.archive_path(download_dir)?;
        info!("downloading {} (from byte {})", self.url, offset);

        let agent = ureq::agent();
        let mut request = agent.get(&self.url);
        if offset > 0 {
            request = request.header("Range", format!("bytes={}-", offset));
        }
        let response = request.call().map_err(|source| Error::Download {
            url: self.url.clone(),
            source: Box::new(source),
        })?;

        // a 200 on a Range request means the server restarted the transfer
        let resumed = offset > 0 && response.status().as_u16() == 206;
        let mut file = if resumed {
            fs::OpenOptions::new().append(true).open(&path)?
        } else {
            fs::File::create(&path)?
        };

        let mut reader = response.into_body().into_reader();
        let mut buffer = [0u8; 8192];
        let mut transferred = 0u64;
        let mut pending = 0u64;
        let mut last_update = Instant::now();
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])?;
            transferred += n as u64;
            pending += n as u64;
            if last_update.elapsed() >= PROGRESS_INTERVAL {
                progress(&DownloadProgress {
                    label: label.to_string(),
                    url: self.url.clone(),
                    total_size: self.size,
                    downloaded: pending,
                    completed: false,
                });
                pending = 0;
                last_update = Instant::now();
            }
        }
        file.flush()?;
        progress(&DownloadProgress {
            label: label.to_string(),
            url: self.url.clone(),
            total_size: self.size,
            downloaded: pending,
            completed: true,
        });

        Ok(Fetched::Downloaded(transferred))
    }

    /// Download and verify, retrying once from scratch on an integrity
    /// mismatch. A second mismatch is [`Error::IntegrityFailure`].
    pub fn fetch_verified(
        &self,
        download_dir: &Path,
        label: &str,
        progress: &mut DownloadProgressFn<'_>,
    ) -> Result<PathBuf> {
        self.download(download_dir, label, progress)?;
        let path = self.archive_path(download_dir)?;
        if self.test_local_archive_integrity(download_dir)? {
            return Ok(path);
        }
        info!("{} failed integrity check, retrying", path.display());
        fs::remove_file(&path)?;
        self.download(download_dir, label, progress)?;
        if self.test_local_archive_integrity(download_dir)? {
            Ok(path)
        } else {
            Err(Error::IntegrityFailure { path })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // sha256 of "firmware-archive"
    const CONTENT: &str = "firmware-archive";
    const CONTENT_SHA256: &str = "8feaf09f1d07a6bb33bb7b18b9c0b60dc97e819c329ab0e8b03e64f23b915fd6";

    fn resource() -> DownloadResource {
        DownloadResource {
            url: "https://example.invalid/avr-gcc.tar.bz2".to_string(),
            checksum: format!("SHA-256:{}", CONTENT_SHA256),
            size: CONTENT.len() as u64,
            cache_path: "packages/arduino/tools".to_string(),
            archive_file_name: "avr-gcc.tar.bz2".to_string(),
        }
    }

    #[test]
    fn test_archive_path_is_deterministic_and_created() {
        let dir = TempDir::new().unwrap();
        let res = resource();
        let path = res.archive_path(dir.path()).unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("packages/arduino/tools")
                .join("avr-gcc.tar.bz2")
        );
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_plan_for_missing_file_is_start() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            resource().transfer_plan(dir.path()).unwrap(),
            TransferPlan::Start
        );
    }

    #[test]
    fn test_plan_for_valid_cache_is_no_transfer() {
        let dir = TempDir::new().unwrap();
        let res = resource();
        fs::write(res.archive_path(dir.path()).unwrap(), CONTENT).unwrap();
        assert!(res.test_local_archive_integrity(dir.path()).unwrap());
        assert_eq!(
            res.transfer_plan(dir.path()).unwrap(),
            TransferPlan::NoTransfer
        );
    }

    #[test]
    fn test_plan_for_partial_file_is_resume() {
        let dir = TempDir::new().unwrap();
        let res = resource();
        fs::write(res.archive_path(dir.path()).unwrap(), &CONTENT[..5]).unwrap();
        assert_eq!(
            res.transfer_plan(dir.path()).unwrap(),
            TransferPlan::Resume(5)
        );
    }

    #[test]
    fn test_oversized_file_is_removed_and_restarted() {
        let dir = TempDir::new().unwrap();
        let res = resource();
        let path = res.archive_path(dir.path()).unwrap();
        fs::write(&path, CONTENT.repeat(3)).unwrap();
        assert_eq!(res.transfer_plan(dir.path()).unwrap(), TransferPlan::Start);
        assert!(!path.exists());
    }

    #[test]
    fn test_full_size_but_wrong_content_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let res = resource();
        fs::write(res.archive_path(dir.path()).unwrap(), "XXXXXXXX-archive").unwrap();
        assert!(res.test_local_archive_size(dir.path()).unwrap());
        assert!(!res.test_local_archive_integrity(dir.path()).unwrap());
        // same-size corruption resumes from nowhere to go; policy keeps the
        // file and the caller's post-download verification catches it
        assert_eq!(
            res.transfer_plan(dir.path()).unwrap(),
            TransferPlan::Resume(CONTENT.len() as u64)
        );
    }

    #[test]
    fn test_download_returns_cached_without_network() {
        let dir = TempDir::new().unwrap();
        let res = resource();
        fs::write(res.archive_path(dir.path()).unwrap(), CONTENT).unwrap();
        // url is unresolvable; reaching the network would fail the test
        let mut updates = Vec::new();
        let fetched = res
            .download(dir.path(), "avr-gcc", &mut |p| updates.push(p.clone()))
            .unwrap();
        assert_eq!(fetched, Fetched::AlreadyCached);
        assert!(updates.is_empty());
    }
}
