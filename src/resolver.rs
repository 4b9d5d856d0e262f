//! Header-to-library resolution.
//!
//! The resolver indexes every top-level `.h`/`.hpp`/`.hh` filename of each
//! scanned library, then picks the best candidate for an `#include` in two
//! stages: a priority score (name-match tier + architecture priority), and for
//! exact score ties an approximate name-similarity ranking over character
//! bigrams. Not finding a header is a normal outcome, not an error.

use crate::errors::Result;
use crate::library::{Library, LibraryList};
use log::debug;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const HEADER_EXTENSIONS: [&str; 3] = ["h", "hpp", "hh"];

// name-match tiers; each strictly outscores the next plus any
// architecture priority (0..=255)
const TIER_EXACT: u32 = 0x500;
const TIER_MASTER_SUFFIX: u32 = 0x400;
const TIER_PREFIX: u32 = 0x300;
const TIER_SUFFIX: u32 = 0x200;
const TIER_SUBSTRING: u32 = 0x100;

#[derive(Debug, Default)]
pub struct HeaderResolver {
    headers: HashMap<String, LibraryList>,
}

impl HeaderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every top-level header filename of `lib`. The scan is not
    /// recursive, and a library is never recorded twice for the same header.
    pub fn scan_library(&mut self, lib: &Arc<Library>) -> Result<()> {
        for entry in std::fs::read_dir(&lib.source_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let is_header = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| HEADER_EXTENSIONS.contains(&e));
            if !is_header {
                continue;
            }
            if let Some(header) = path.file_name().and_then(|n| n.to_str()) {
                self.headers
                    .entry(header.to_string())
                    .or_default()
                    .add_unique(lib.clone());
            }
        }
        Ok(())
    }

    /// All libraries providing `header`, in scan order.
    pub fn alternatives_for(&self, header: &str) -> Option<&LibraryList> {
        self.headers.get(header)
    }

    /// The most suitable library for `header` on `architecture`, or `None`
    /// if no scanned library provides it.
    pub fn resolve_for(&self, header: &str, architecture: &str) -> Option<Arc<Library>> {
        debug!("resolving include {} for arch {}", header, architecture);
        let candidates = self.headers.get(header)?;

        let mut best: Vec<&Arc<Library>> = Vec::new();
        let mut best_priority = 0u32;
        for lib in candidates.iter() {
            let priority = compute_priority(lib, header, architecture);
            if best.is_empty() || priority > best_priority {
                debug!("  found better lib {} (prio {:03X})", lib.name, priority);
                best.clear();
                best.push(lib);
                best_priority = priority;
            } else if priority == best_priority {
                debug!("  found another lib {} with same priority", lib.name);
                best.push(lib);
            } else {
                debug!("  discarded {} (prio {:03X})", lib.name, priority);
            }
        }

        match best.len() {
            0 => None,
            1 => Some(best[0].clone()),
            // several candidates with the same score: pick the one whose
            // name is closest to the header name
            _ => {
                let winner = closest_name_match(header, &best);
                debug!("  library with the best matching name: {}", winner.name);
                Some(winner)
            }
        }
    }
}

/// Case-fold and strip symbols so `"WiFi 101"` and `"wifi101"` compare equal.
/// `-` and `_` survive so the `name-master` tier can still match.
fn simplify(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn compute_priority(lib: &Library, header: &str, arch: &str) -> u32 {
    let base = Path::new(header)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(header);
    let header = simplify(base);
    let name = simplify(&lib.name);

    let mut priority = lib.priority_for_architecture(arch) as u32;
    if name == header {
        priority += TIER_EXACT;
    } else if name == format!("{}-master", header) {
        priority += TIER_MASTER_SUFFIX;
    } else if name.starts_with(&header) {
        priority += TIER_PREFIX;
    } else if name.ends_with(&header) {
        priority += TIER_SUFFIX;
    } else if name.contains(&header) {
        priority += TIER_SUBSTRING;
    }
    priority
}

/// Bag of character bigrams, with multiplicity.
fn bigram_bag(s: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = s.chars().collect();
    let mut bag = HashMap::new();
    for pair in chars.windows(2) {
        *bag.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    bag
}

/// Shared-bigram count between two bags (multiset intersection size).
fn bigram_overlap(a: &HashMap<(char, char), usize>, b: &HashMap<(char, char), usize>) -> usize {
    a.iter()
        .map(|(bigram, count)| b.get(bigram).map_or(0, |other| (*count).min(*other)))
        .sum()
}

fn closest_name_match(header: &str, candidates: &[&Arc<Library>]) -> Arc<Library> {
    let target = bigram_bag(&simplify(header));
    let mut winner = candidates[0];
    let mut winner_score = bigram_overlap(&target, &bigram_bag(&simplify(&winner.name)));
    for lib in &candidates[1..] {
        let score = bigram_overlap(&target, &bigram_bag(&simplify(&lib.name)));
        if score > winner_score {
            winner = lib;
            winner_score = score;
        }
    }
    winner.clone()
}
