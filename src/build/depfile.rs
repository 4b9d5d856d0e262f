//! Make-style `.d` dependency files and the per-object staleness decision.
//!
//! The staleness checker is deliberately conservative: any anomaly — an
//! unreadable dependency file, a mismatched header line, a dependency that
//! vanished mid-check — forces a rebuild instead of raising an error. Never
//! reusing a possibly-stale object outranks avoiding redundant work.

use crate::errors::Result;
use log::debug;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Undo the escaping compilers apply to dependency paths.
fn unescape_dep(s: &str) -> String {
    s.replace("\\ ", " ")
        .replace("\\\t", "\t")
        .replace("\\#", "#")
        .replace("$$", "$")
        .replace("\\\\", "\\")
}

fn strip_trailing_backslash(s: &str) -> &str {
    s.strip_suffix('\\').unwrap_or(s)
}

/// Parse `.d` content into trimmed, unescaped, non-empty rows. The first row
/// (when well-formed) is `<object>:`, the rest are dependency paths.
pub fn parse_dep_rows(content: &str) -> Vec<String> {
    content
        .lines()
        .map(strip_trailing_backslash)
        .map(str::trim)
        .map(unescape_dep)
        .filter(|row| !row.is_empty())
        .collect()
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether `object_file` can be reused for `source_file`.
///
/// True iff the object exists, the dependency file exists and is not older
/// than the source, the dependency file's first row names exactly this
/// object, and every listed dependency still exists and is not newer than
/// the object.
pub fn obj_file_is_up_to_date(
    source_file: &Path,
    object_file: &Path,
    dependency_file: &Path,
) -> Result<bool> {
    let source_mtime = fs::metadata(source_file)?.modified()?;

    let Some(object_mtime) = modified(object_file) else {
        debug!("not found: {}", object_file.display());
        return Ok(false);
    };
    let Some(dep_mtime) = modified(dependency_file) else {
        debug!("not found: {}", dependency_file.display());
        return Ok(false);
    };

    if source_mtime > object_mtime {
        debug!("{} newer than {}", source_file.display(), object_file.display());
        return Ok(false);
    }
    if source_mtime > dep_mtime {
        debug!("{} newer than {}", source_file.display(), dependency_file.display());
        return Ok(false);
    }

    // an unreadable dep file forces a rebuild, it is never an error
    let content = match fs::read_to_string(dependency_file) {
        Ok(content) => content,
        Err(e) => {
            debug!("failed to read {}: {}", dependency_file.display(), e);
            return Ok(false);
        }
    };
    let rows = parse_dep_rows(&content);
    let Some((first, deps)) = rows.split_first() else {
        return Ok(true);
    };

    let Some(named_object) = first.strip_suffix(':') else {
        debug!("no colon in first line of {}", dependency_file.display());
        return Ok(false);
    };
    if Path::new(named_object) != object_file {
        debug!("dep file is about a different object: {}", named_object);
        return Ok(false);
    }

    for dep in deps {
        // vanished or unreadable dependencies also force a rebuild
        let Some(dep_mtime) = modified(Path::new(dep)) else {
            debug!("not found: {}", dep);
            return Ok(false);
        };
        if dep_mtime > object_mtime {
            debug!("{} newer than {}", dep, object_file.display());
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path, content: &str, age: Duration) {
        fs::write(path, content).unwrap();
        let mtime = SystemTime::now() - age;
        let file = fs::OpenOptions::new().append(true).open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    fn old(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    struct Fixture {
        _dir: TempDir,
        source: std::path::PathBuf,
        object: std::path::PathBuf,
        dep: std::path::PathBuf,
        header: std::path::PathBuf,
    }

    /// source and header are old, object and dep file are fresh: up to date.
    fn fresh_build() -> Fixture {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("main.c");
        let object = dir.path().join("main.c.o");
        let dep = dir.path().join("main.c.d");
        let header = dir.path().join("main.h");
        touch(&source, "int main(){}", old(100));
        touch(&header, "#pragma once", old(100));
        let dep_content = format!(
            "{}: \\\n {} \\\n {}\n",
            object.display(),
            source.display(),
            header.display()
        );
        touch(&object, "obj", old(10));
        touch(&dep, &dep_content, old(10));
        Fixture {
            _dir: dir,
            source,
            object,
            dep,
            header,
        }
    }

    #[test]
    fn test_up_to_date_when_all_conditions_hold() {
        let f = fresh_build();
        assert!(obj_file_is_up_to_date(&f.source, &f.object, &f.dep).unwrap());
    }

    #[test]
    fn test_missing_object_forces_rebuild() {
        let f = fresh_build();
        fs::remove_file(&f.object).unwrap();
        assert!(!obj_file_is_up_to_date(&f.source, &f.object, &f.dep).unwrap());
    }

    #[test]
    fn test_missing_dep_file_forces_rebuild() {
        let f = fresh_build();
        fs::remove_file(&f.dep).unwrap();
        assert!(!obj_file_is_up_to_date(&f.source, &f.object, &f.dep).unwrap());
    }

    #[test]
    fn test_source_newer_than_object_forces_rebuild() {
        let f = fresh_build();
        touch(&f.source, "int main(){return 1;}", old(0));
        assert!(!obj_file_is_up_to_date(&f.source, &f.object, &f.dep).unwrap());
    }

    #[test]
    fn test_dep_newer_than_object_forces_rebuild() {
        let f = fresh_build();
        touch(&f.header, "#pragma once\n// edited", old(0));
        assert!(!obj_file_is_up_to_date(&f.source, &f.object, &f.dep).unwrap());
    }

    #[test]
    fn test_vanished_dependency_forces_rebuild_not_error() {
        let f = fresh_build();
        fs::remove_file(&f.header).unwrap();
        assert!(!obj_file_is_up_to_date(&f.source, &f.object, &f.dep).unwrap());
    }

    #[test]
    fn test_header_line_about_other_object_forces_rebuild() {
        let f = fresh_build();
        touch(&f.dep, "/somewhere/else.o:\n", old(10));
        assert!(!obj_file_is_up_to_date(&f.source, &f.object, &f.dep).unwrap());
    }

    #[test]
    fn test_garbage_dep_file_forces_rebuild() {
        let f = fresh_build();
        touch(&f.dep, "no colon here\n", old(10));
        assert!(!obj_file_is_up_to_date(&f.source, &f.object, &f.dep).unwrap());
    }

    #[test]
    fn test_empty_dep_file_counts_as_up_to_date() {
        let f = fresh_build();
        touch(&f.dep, "\n   \n", old(10));
        assert!(obj_file_is_up_to_date(&f.source, &f.object, &f.dep).unwrap());
    }

    #[test]
    fn test_unescape_sequences() {
        assert_eq!(unescape_dep("a\\ b"), "a b");
        assert_eq!(unescape_dep("a\\#b"), "a#b");
        assert_eq!(unescape_dep("a$$b"), "a$b");
        assert_eq!(unescape_dep("a\\\\b"), "a\\b");
    }

    #[test]
    fn test_parse_rows_handles_continuations() {
        let rows = parse_dep_rows("main.o: \\\n main.c \\\n My\\ Lib.h\n\n");
        assert_eq!(rows, ["main.o:", "main.c", "My Lib.h"]);
    }
}
