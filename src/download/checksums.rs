//! Archive and directory integrity checks.
//!
//! Archive checksums arrive as `"ALGO:HEXDIGEST"` strings; the algorithm
//! token is case-sensitive and must be one of `SHA-256`, `SHA-1` or `MD5` —
//! anything else is a hard parse failure, never a silent pass. Installed
//! package directories carry a small JSON manifest with a SHA-256 over every
//! file's content, recomputed in a stable walk order.

use crate::errors::{Error, Result};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use walkdir::WalkDir;

/// Manifest file stored inside an installed package directory. Excluded from
/// its own checksum.
pub const DIR_MANIFEST_FILE: &str = ".bric-checksum.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha1,
    Md5,
}

impl FromStr for ChecksumAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SHA-256" => Ok(Self::Sha256),
            "SHA-1" => Ok(Self::Sha1),
            "MD5" => Ok(Self::Md5),
            other => Err(Error::UnsupportedChecksumAlgorithm(other.to_string())),
        }
    }
}

/// A parsed `"ALGO:HEXDIGEST"` checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub algorithm: ChecksumAlgorithm,
    pub digest: Vec<u8>,
}

impl FromStr for Checksum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (algo, hex_digest) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidChecksumFormat(s.to_string()))?;
        let algorithm = algo.parse()?;
        let digest = hex::decode(hex_digest).map_err(|source| Error::InvalidChecksumDigest {
            digest: hex_digest.to_string(),
            source,
        })?;
        Ok(Self { algorithm, digest })
    }
}

impl Checksum {
    /// Stream the file and compare digests. A mismatch is `Ok(false)`, not an
    /// error.
    pub fn matches_file(&self, path: &Path) -> Result<bool> {
        let actual = match self.algorithm {
            ChecksumAlgorithm::Sha256 => digest_file::<Sha256>(path)?,
            ChecksumAlgorithm::Sha1 => digest_file::<Sha1>(path)?,
            ChecksumAlgorithm::Md5 => digest_file::<Md5>(path)?,
        };
        Ok(actual == self.digest)
    }
}

fn digest_file<D: Digest>(path: &Path) -> Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    let mut hasher = D::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

#[derive(Debug, Serialize, Deserialize)]
struct DirManifest {
    checksum: String,
}

/// SHA-256 over the concatenated content of every file under `root`, walked
/// in a stable (name-sorted) order. The manifest itself, when directly under
/// `root`, is excluded. Unreadable files are skipped rather than failing the
/// whole scan.
pub fn compute_dir_checksum(root: &Path) -> Result<String> {
    let manifest_path = root.join(DIR_MANIFEST_FILE);
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() || entry.path() == manifest_path {
            continue;
        }
        let mut file = match fs::File::open(entry.path()) {
            Ok(f) => f,
            Err(_) => continue,
        };
        let mut buffer = [0u8; 8192];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Write (or refresh) the directory manifest under `root`.
pub fn write_dir_manifest(root: &Path) -> Result<()> {
    let manifest = DirManifest {
        checksum: compute_dir_checksum(root)?,
    };
    let json = serde_json::to_string(&manifest)?;
    fs::write(root.join(DIR_MANIFEST_FILE), json)?;
    Ok(())
}

/// Compare the stored manifest checksum against a recomputed one. Validity is
/// exact string equality. A missing or unreadable manifest is an error, since
/// the caller cannot tell a pristine tree from a tampered one.
pub fn check_dir_checksum(root: &Path) -> Result<bool> {
    let json = fs::read_to_string(root.join(DIR_MANIFEST_FILE))?;
    let manifest: DirManifest = serde_json::from_str(&json)?;
    Ok(manifest.checksum == compute_dir_checksum(root)?)
}
