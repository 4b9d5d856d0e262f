//! Coarse cache-validity probes over whole source trees.
//!
//! Used to decide whether a cached core archive can be trusted at all before
//! the per-object staleness checks run. Any walk or stat failure counts as
//! changed, so a broken tree invalidates the cache rather than silently
//! keeping it.

use log::debug;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Whether any file under the core tree (or the referenced core tree) is
/// newer than `target_file`. A missing target means changed.
pub fn core_tree_changed(
    core_path: &Path,
    referenced_core_path: Option<&Path>,
    target_file: &Path,
) -> bool {
    tree_changed(core_path, referenced_core_path, target_file, false)
}

/// Like [`core_tree_changed`] but only `.txt` files count, which covers the
/// platform configuration files that drive the recipes.
pub fn build_rules_changed(
    core_path: &Path,
    referenced_core_path: Option<&Path>,
    target_file: &Path,
) -> bool {
    tree_changed(core_path, referenced_core_path, target_file, true)
}

fn tree_changed(
    core_path: &Path,
    referenced_core_path: Option<&Path>,
    target_file: &Path,
    rules_only: bool,
) -> bool {
    let Ok(target_mtime) = fs::metadata(target_file).and_then(|m| m.modified()) else {
        debug!("cannot stat {}", target_file.display());
        return true;
    };
    if any_file_newer(core_path, target_mtime, rules_only) {
        return true;
    }
    // one level of referenced-core indirection, never deeper
    match referenced_core_path {
        Some(referenced) if referenced != core_path => {
            any_file_newer(referenced, target_mtime, rules_only)
        }
        _ => false,
    }
}

fn any_file_newer(root: &Path, target_mtime: SystemTime, rules_only: bool) -> bool {
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with('.'))
    });
    for entry in walker {
        let Ok(entry) = entry else {
            debug!("walk failed under {}", root.display());
            return true;
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if rules_only && entry.path().extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let Ok(mtime) = entry.path().metadata().and_then(|m| m.modified()) else {
            debug!("cannot stat {}", entry.path().display());
            return true;
        };
        if mtime > target_mtime {
            debug!("{} newer than target", entry.path().display());
            return true;
        }
    }
    false
}
