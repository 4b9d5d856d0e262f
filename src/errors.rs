//! Crate-wide error taxonomy.
//!
//! Lookup operations (`find_platform`, header resolution, ...) return
//! `Option` so callers can craft contextual messages; the variants here cover
//! operational failures only. The staleness checker never surfaces filesystem
//! races as errors — it forces a rebuild instead.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // --- lookups that must name what was missing ---
    #[error("package {0} not found")]
    PackageNotFound(String),

    #[error("platform {architecture} not found in package {package}")]
    PlatformNotFound { package: String, architecture: String },

    #[error("required version {version} not found for platform {platform}")]
    PlatformReleaseNotFound { platform: String, version: String },

    #[error("platform {0} has no available releases")]
    NoReleases(String),

    #[error("tool {0} not found")]
    ToolNotFound(String),

    #[error("required version {version} not found for tool {tool}")]
    ToolReleaseNotFound { tool: String, version: String },

    #[error("resolving tool dependencies for platform {platform}: {source}")]
    DependencyResolution {
        platform: String,
        #[source]
        source: Box<Error>,
    },

    #[error("tool {0} not available for your OS")]
    NoCompatibleFlavour(String),

    // --- malformed input ---
    #[error("invalid FQBN '{fqbn}': {reason}")]
    InvalidFqbn { fqbn: String, reason: String },

    #[error("invalid value '{value}' for option '{option}'")]
    InvalidOptionValue { option: String, value: String },

    #[error("invalid empty option found")]
    EmptyOption,

    #[error("invalid option '{0}'")]
    InvalidOption(String),

    #[error("invalid checksum format: {0}")]
    InvalidChecksumFormat(String),

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedChecksumAlgorithm(String),

    #[error("invalid hash '{digest}': {source}")]
    InvalidChecksumDigest {
        digest: String,
        #[source]
        source: hex::FromHexError,
    },

    // --- downloads ---
    #[error("archive {path} failed integrity check after download")]
    IntegrityFailure { path: PathBuf },

    #[error("downloading {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    // --- recipe execution ---
    #[error("{0} pattern is missing")]
    RecipePatternMissing(String),

    #[error("running '{command}': exit status {status}\n{stderr}")]
    ExecutionFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("could not spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("empty command line for recipe {0}")]
    EmptyCommandLine(String),

    #[error("building worker pool: {0}")]
    WorkerPool(String),

    // --- plumbing ---
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("reading manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}
