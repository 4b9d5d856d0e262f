//! Platform and tool model plus dependency resolution.
//!
//! A [`Platform`] owns a version-ordered set of immutable
//! [`PlatformRelease`] snapshots; tools mirror that shape with per-OS
//! resource flavours. Lookups are pure — "not found" is an `Option`, never an
//! error — so callers can craft contextual messages.
//! [`PackageIndex::find_platform_release_dependencies`] is the fallible
//! entry point that resolves a reference to a concrete release plus its
//! transitive tool dependencies, replacing "latest" markers with concrete
//! versions.

use crate::board::Board;
use crate::download::{DownloadResource, Fetched};
use crate::errors::{Error, Result};
use crate::progress::{DownloadProgressFn, TaskProgress, TaskProgressFn};
use crate::props::PropertyStore;
use indexmap::IndexMap;
use log::debug;
use semver::Version;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Identifies a platform; `version` absent means "latest".
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformReference {
    pub package: String,
    pub architecture: String,
    pub version: Option<Version>,
}

impl fmt::Display for PlatformReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.architecture)?;
        if let Some(version) = &self.version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

/// A tool requirement declared by a platform release.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDependency {
    pub package: String,
    pub name: String,
    pub version: ToolVersion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolVersion {
    /// Resolved to the tool's highest available version.
    Latest,
    Exact(Version),
}

/// An OS-specific build of a tool release.
#[derive(Debug, Clone, PartialEq)]
pub struct Flavour {
    /// Host triple this build runs on, `*` for any.
    pub os: String,
    pub resource: DownloadResource,
}

#[derive(Debug, Clone)]
pub struct ToolRelease {
    pub name: String,
    pub version: Version,
    pub flavours: Vec<Flavour>,
}

impl ToolRelease {
    /// The flavour compatible with the running host, if any. Exactly one is
    /// expected to match.
    pub fn compatible_flavour(&self) -> Option<&Flavour> {
        let host = host_triple();
        self.flavours.iter().find(|f| f.os == "*" || f.os == host)
    }
}

impl fmt::Display for ToolRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// The host triple in the naming convention tool indexes use.
pub fn host_triple() -> &'static str {
    if cfg!(target_os = "linux") {
        if cfg!(target_arch = "x86_64") {
            "x86_64-linux-gnu"
        } else if cfg!(target_arch = "aarch64") {
            "aarch64-linux-gnu"
        } else if cfg!(target_arch = "arm") {
            "arm-linux-gnueabihf"
        } else {
            "i686-linux-gnu"
        }
    } else if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") {
            "arm64-apple-darwin"
        } else {
            "x86_64-apple-darwin"
        }
    } else if cfg!(target_os = "windows") {
        "i686-mingw32"
    } else {
        "unknown"
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tool {
    pub name: String,
    releases: BTreeMap<Version, ToolRelease>,
}

impl Tool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            releases: BTreeMap::new(),
        }
    }

    /// Version keys are unique within a tool; adding an existing version
    /// replaces the release.
    pub fn add_release(&mut self, release: ToolRelease) {
        self.releases.insert(release.version.clone(), release);
    }

    pub fn release(&self, version: &Version) -> Option<&ToolRelease> {
        self.releases.get(version)
    }

    /// The highest version by semver ordering.
    pub fn latest_release(&self) -> Option<&ToolRelease> {
        self.releases.values().next_back()
    }
}

/// An immutable snapshot of one platform version.
#[derive(Debug, Clone)]
pub struct PlatformRelease {
    pub package: String,
    pub architecture: String,
    pub version: Version,
    pub properties: PropertyStore,
    pub boards: IndexMap<String, Board>,
    pub tool_dependencies: Vec<ToolDependency>,
    pub resource: DownloadResource,
}

impl PlatformRelease {
    pub fn name(&self) -> &str {
        self.properties.get("name").unwrap_or("")
    }

    pub fn board(&self, board_id: &str) -> Option<&Board> {
        self.boards.get(board_id)
    }
}

impl fmt::Display for PlatformRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.package, self.architecture, self.version)
    }
}

#[derive(Debug, Clone)]
pub struct Platform {
    pub package: String,
    pub architecture: String,
    releases: BTreeMap<Version, PlatformRelease>,
}

impl Platform {
    pub fn new(package: &str, architecture: &str) -> Self {
        Self {
            package: package.to_string(),
            architecture: architecture.to_string(),
            releases: BTreeMap::new(),
        }
    }

    pub fn add_release(&mut self, release: PlatformRelease) {
        self.releases.insert(release.version.clone(), release);
    }

    pub fn release(&self, version: &Version) -> Option<&PlatformRelease> {
        self.releases.get(version)
    }

    /// The highest version by semver ordering.
    pub fn latest_release(&self) -> Option<&PlatformRelease> {
        self.releases.values().next_back()
    }

    pub fn releases(&self) -> impl Iterator<Item = &PlatformRelease> {
        self.releases.values()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.architecture)
    }
}

/// A vendor package: platforms plus the tools they depend on.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub name: String,
    pub platforms: IndexMap<String, Platform>,
    pub tools: IndexMap<String, Tool>,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Everything the hardware loader discovered, immutable for the duration of
/// a scan generation.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    packages: IndexMap<String, Package>,
}

impl PackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_package(&mut self, package: Package) {
        self.packages.insert(package.name.clone(), package);
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// The platform matching the reference, version ignored.
    pub fn find_platform(&self, reference: &PlatformReference) -> Option<&Platform> {
        self.packages
            .get(&reference.package)?
            .platforms
            .get(&reference.architecture)
    }

    /// The release matching the reference; an absent version means latest.
    pub fn find_platform_release(&self, reference: &PlatformReference) -> Option<&PlatformRelease> {
        let platform = self.find_platform(reference)?;
        match &reference.version {
            Some(version) => platform.release(version),
            None => platform.latest_release(),
        }
    }

    /// Resolve a reference to a concrete release and its transitive tool
    /// dependencies, with "latest" markers replaced by concrete versions.
    pub fn find_platform_release_dependencies(
        &self,
        reference: &PlatformReference,
    ) -> Result<(&PlatformRelease, Vec<&ToolRelease>)> {
        let package = self
            .packages
            .get(&reference.package)
            .ok_or_else(|| Error::PackageNotFound(reference.package.clone()))?;
        let platform = package
            .platforms
            .get(&reference.architecture)
            .ok_or_else(|| Error::PlatformNotFound {
                package: reference.package.clone(),
                architecture: reference.architecture.clone(),
            })?;

        let release = match &reference.version {
            Some(version) => {
                platform
                    .release(version)
                    .ok_or_else(|| Error::PlatformReleaseNotFound {
                        platform: platform.to_string(),
                        version: version.to_string(),
                    })?
            }
            None => platform
                .latest_release()
                .ok_or_else(|| Error::NoReleases(platform.to_string()))?,
        };

        let tool_releases =
            self.tool_dependencies_of(release)
                .map_err(|source| Error::DependencyResolution {
                    platform: release.to_string(),
                    source: Box::new(source),
                })?;
        Ok((release, tool_releases))
    }

    /// Resolve every tool dependency of `release` to a concrete
    /// [`ToolRelease`].
    pub fn tool_dependencies_of(&self, release: &PlatformRelease) -> Result<Vec<&ToolRelease>> {
        let mut resolved = Vec::with_capacity(release.tool_dependencies.len());
        for dep in &release.tool_dependencies {
            let tool = self
                .packages
                .get(&dep.package)
                .ok_or_else(|| Error::PackageNotFound(dep.package.clone()))?
                .tools
                .get(&dep.name)
                .ok_or_else(|| Error::ToolNotFound(format!("{}:{}", dep.package, dep.name)))?;
            let tool_release = match &dep.version {
                ToolVersion::Exact(version) => {
                    tool.release(version)
                        .ok_or_else(|| Error::ToolReleaseNotFound {
                            tool: tool.name.clone(),
                            version: version.to_string(),
                        })?
                }
                ToolVersion::Latest => {
                    let latest =
                        tool.latest_release()
                            .ok_or_else(|| Error::ToolReleaseNotFound {
                                tool: tool.name.clone(),
                                version: "latest".to_string(),
                            })?;
                    debug!("tool {} latest resolved to {}", tool.name, latest.version);
                    latest
                }
            };
            resolved.push(tool_release);
        }
        Ok(resolved)
    }

    /// Conditionally download a platform release archive.
    /// [`Fetched::AlreadyCached`] means the cache already passed integrity.
    pub fn download_platform_release(
        &self,
        release: &PlatformRelease,
        download_dir: &Path,
        progress: &mut DownloadProgressFn<'_>,
        task: &mut TaskProgressFn<'_>,
    ) -> Result<Fetched> {
        task(&TaskProgress::named(&format!("Downloading {}", release)));
        let fetched = release
            .resource
            .download(download_dir, &release.to_string(), progress)?;
        task(&TaskProgress::completed(&download_summary(
            &release.to_string(),
            fetched,
        )));
        Ok(fetched)
    }

    /// Conditionally download the host-compatible flavour of a tool release.
    pub fn download_tool_release(
        &self,
        tool: &ToolRelease,
        download_dir: &Path,
        progress: &mut DownloadProgressFn<'_>,
        task: &mut TaskProgressFn<'_>,
    ) -> Result<Fetched> {
        let flavour = tool
            .compatible_flavour()
            .ok_or_else(|| Error::NoCompatibleFlavour(tool.to_string()))?;
        task(&TaskProgress::named(&format!("Downloading {}", tool)));
        let fetched = flavour
            .resource
            .download(download_dir, &tool.to_string(), progress)?;
        task(&TaskProgress::completed(&download_summary(
            &tool.to_string(),
            fetched,
        )));
        Ok(fetched)
    }
}

fn download_summary(label: &str, fetched: Fetched) -> String {
    match fetched {
        Fetched::AlreadyCached => format!("{} already downloaded", label),
        Fetched::Downloaded(_) => format!("{} downloaded", label),
    }
}
