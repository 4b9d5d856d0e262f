//! Core archive caching.
//!
//! The compiled core is bundled into a static archive whose file name is a
//! pure function of the board identifier and the absolute core folder, so
//! the same core built for the same board always maps to the same cache
//! entry. The archive itself is only rebuilt when an object file is newer
//! than it.

use super::core::{BuildContext, compile_files};
use super::recipe::exec_recipe;
use crate::errors::Result;
use crate::props::PropertyStore;
use log::debug;
use md5::{Digest, Md5};
use std::fs;
use std::path::{Path, PathBuf};

/// Most filesystems cap file names at 255 bytes; stay well under it.
const MAX_ARCHIVE_NAME_LEN: usize = 100;

/// The cache file name for a core archive:
/// `core_<fqbn with ':' and '=' as '_'>_<md5 of absolute core folder>.a`,
/// collapsed to `core_<md5 of the whole tag>.a` when it grows too long.
pub fn cached_core_archive_file_name(fqbn: &str, core_folder: &Path) -> String {
    let board_tag = fqbn.replace(':', "_").replace('=', "_");
    let folder = std::path::absolute(core_folder).unwrap_or_else(|_| core_folder.to_path_buf());
    let folder_hash = hex::encode(Md5::digest(folder.display().to_string().as_bytes()));
    let name = format!("core_{}_{}.a", board_tag, folder_hash);
    if name.len() > MAX_ARCHIVE_NAME_LEN {
        let collapsed = hex::encode(Md5::digest(format!("{}_{}", board_tag, folder_hash)));
        format!("core_{}.a", collapsed)
    } else {
        name
    }
}

/// Bundle `object_files` into `<build_path>/<archive_file_name>` using
/// `recipe.ar.pattern`, one invocation per object. An existing archive is
/// reused unless some object is newer than it (or unreadable).
pub fn archive_compiled_files(
    build_path: &Path,
    archive_file_name: &str,
    object_files: &[PathBuf],
    build_properties: &PropertyStore,
) -> Result<PathBuf> {
    let archive_path = build_path.join(archive_file_name);

    if let Ok(stat) = fs::metadata(&archive_path) {
        let archive_mtime = stat.modified()?;
        let stale = object_files.iter().any(|object| {
            fs::metadata(object)
                .and_then(|m| m.modified())
                .map(|mtime| mtime > archive_mtime)
                .unwrap_or(true)
        });
        if stale {
            fs::remove_file(&archive_path)?;
        } else {
            debug!("using previously archived: {}", archive_path.display());
            return Ok(archive_path);
        }
    }

    for object in object_files {
        let mut props = build_properties.clone();
        props.set("archive_file", archive_file_name);
        props.set("archive_file_path", &archive_path.display().to_string());
        props.set("object_file", &object.display().to_string());
        exec_recipe(&props, "recipe.ar.pattern", false)?;
    }

    Ok(archive_path)
}

/// Compile the core tree and archive it under its cache name.
pub fn build_core(
    ctx: &BuildContext,
    fqbn: &str,
    core_path: &Path,
    build_path: &Path,
    build_properties: &PropertyStore,
    includes: &[String],
) -> Result<PathBuf> {
    let object_files = compile_files(ctx, core_path, true, build_path, build_properties, includes)?;
    let archive_file_name = cached_core_archive_file_name(fqbn, core_path);
    archive_compiled_files(build_path, &archive_file_name, &object_files, build_properties)
}
