//! Library model: install locations, architecture priorities and lists.

use std::path::PathBuf;
use std::sync::Arc;

/// Where a library was installed from. The discriminant doubles as the
/// tie-break weight added to the architecture priority, lowest to highest:
/// built-in < platform-bundled < sketchbook < IDE-bundled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Location {
    BuiltIn = 0,
    PlatformBundled = 1,
    Sketchbook = 2,
    IdeBundled = 3,
}

impl Location {
    pub fn weight(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone)]
pub struct Library {
    pub name: String,
    /// Directory holding the library's top-level headers.
    pub source_dir: PathBuf,
    /// Architectures this library declares support for; `*` means any.
    pub architectures: Vec<String>,
    pub location: Location,
}

impl Library {
    pub fn new(name: &str, source_dir: PathBuf, architectures: &[&str], location: Location) -> Self {
        Self {
            name: name.to_string(),
            source_dir,
            architectures: architectures.iter().map(|s| s.to_string()).collect(),
            location,
        }
    }

    /// Stable identity key: name plus install location. Two scans of the same
    /// library compare equal even across separate allocations.
    pub fn key(&self) -> (&str, Location) {
        (self.name.as_str(), self.location)
    }

    /// Priority of this library for the given architecture, 0..=255, higher
    /// wins. An exact architecture match outranks a `*` wildcard, which
    /// outranks no match; the install location breaks ties inside a band.
    pub fn priority_for_architecture(&self, arch: &str) -> u8 {
        let band = if self.architectures.iter().any(|a| a == arch) {
            0x40
        } else if self.architectures.iter().any(|a| a == "*") {
            0x20
        } else {
            0x00
        };
        band + self.location.weight()
    }
}

/// An ordered collection of libraries, deduplicated by [`Library::key`].
#[derive(Debug, Clone, Default)]
pub struct LibraryList {
    libs: Vec<Arc<Library>>,
}

impl LibraryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, lib: &Library) -> bool {
        self.libs.iter().any(|l| l.key() == lib.key())
    }

    pub fn add(&mut self, lib: Arc<Library>) {
        self.libs.push(lib);
    }

    /// Add unless an identical library is already present.
    pub fn add_unique(&mut self, lib: Arc<Library>) {
        if !self.contains(&lib) {
            self.libs.push(lib);
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Arc<Library>> {
        self.libs.iter().find(|l| l.name == name)
    }

    /// Descending architecture priority, stable for equal priorities.
    pub fn sort_by_architecture_priority(&mut self, arch: &str) {
        self.libs
            .sort_by_key(|l| std::cmp::Reverse(l.priority_for_architecture(arch)));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Library>> {
        self.libs.iter()
    }

    pub fn len(&self) -> usize {
        self.libs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libs.is_empty()
    }
}
