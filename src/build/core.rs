//! The parallel compile pipeline.
//!
//! Sources are grouped by kind (assembly, C, C++), each kind compiled with
//! its own recipe by a fixed-size worker pool draining a shared queue. The
//! feeder stops enqueueing as soon as any worker reports an error; in-flight
//! jobs finish, and exactly the first observed error propagates. Object
//! lists are sorted before being handed to the next stage so the output is
//! independent of completion order.

use super::depfile::obj_file_is_up_to_date;
use super::recipe::exec_recipe;
use crate::errors::{Error, Result};
use crate::props::PropertyStore;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, mpsc};
use walkdir::WalkDir;

/// Source kinds in compile order, each with its recipe property.
const SOURCE_KINDS: [(&str, &str); 3] = [
    ("S", "recipe.S.o.pattern"),
    ("c", "recipe.c.o.pattern"),
    ("cpp", "recipe.cpp.o.pattern"),
];

/// Caller-supplied knobs for one build invocation.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Worker count; 0 means host parallelism.
    pub jobs: usize,
    pub verbose: bool,
    /// Selects `compiler.warning_flags.<level>` from the build properties.
    pub warnings_level: String,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            jobs: 0,
            verbose: false,
            warnings_level: "none".to_string(),
        }
    }
}

impl BuildContext {
    fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Compile every source under `source_path`, one batch per source kind, and
/// return the object paths of all kinds concatenated.
pub fn compile_files(
    ctx: &BuildContext,
    source_path: &Path,
    recurse: bool,
    build_path: &Path,
    build_properties: &PropertyStore,
    includes: &[String],
) -> Result<Vec<PathBuf>> {
    let mut object_files = Vec::new();
    for (extension, recipe) in SOURCE_KINDS {
        let sources = find_sources(source_path, extension, recurse)?;
        object_files.extend(compile_files_with_recipe(
            ctx,
            source_path,
            &sources,
            build_path,
            build_properties,
            includes,
            recipe,
        )?);
    }
    Ok(object_files)
}

/// Sources with the given extension under `dir`, name-sorted. Hidden files
/// and directories are skipped.
fn find_sources(dir: &Path, extension: &str, recurse: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recurse { usize::MAX } else { 1 };
    let mut sources = Vec::new();
    let walker = WalkDir::new(dir)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with('.'))
        });
    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(extension)
        {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

fn compile_files_with_recipe(
    ctx: &BuildContext,
    source_path: &Path,
    sources: &[PathBuf],
    build_path: &Path,
    build_properties: &PropertyStore,
    includes: &[String],
    recipe: &str,
) -> Result<Vec<PathBuf>> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }

    let jobs = ctx.effective_jobs();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))?;

    // the feeder below runs on one of the pool's own threads, so the queue
    // must hold the whole batch without blocking; workers re-check the error
    // flag per item, which keeps a failure from starting new work
    let (tx, rx) = mpsc::sync_channel::<&PathBuf>(sources.len());
    let queue = Mutex::new(rx);
    let object_files: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());
    let errors: Mutex<Vec<Error>> = Mutex::new(Vec::new());

    pool.scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|_| {
                loop {
                    let next = lock(&queue).recv();
                    let Ok(source) = next else { break };
                    if !lock(&errors).is_empty() {
                        // drain the queue without starting new work
                        continue;
                    }
                    match compile_file_with_recipe(
                        ctx,
                        source_path,
                        source,
                        build_path,
                        build_properties,
                        includes,
                        recipe,
                    ) {
                        Ok(object_file) => lock(&object_files).push(object_file),
                        Err(e) => lock(&errors).push(e),
                    }
                }
            });
        }

        // feed until done or a worker failed; in-flight jobs finish
        for source in sources {
            if !lock(&errors).is_empty() {
                break;
            }
            if tx.send(source).is_err() {
                break;
            }
        }
        drop(tx);
    });

    let mut errors = errors.into_inner().unwrap_or_else(|e| e.into_inner());
    if !errors.is_empty() {
        // first error observed wins
        return Err(errors.swap_remove(0));
    }

    let mut object_files = object_files.into_inner().unwrap_or_else(|e| e.into_inner());
    object_files.sort();
    Ok(object_files)
}

fn compile_file_with_recipe(
    ctx: &BuildContext,
    source_path: &Path,
    source: &Path,
    build_path: &Path,
    build_properties: &PropertyStore,
    includes: &[String],
    recipe: &str,
) -> Result<PathBuf> {
    let mut props = build_properties.clone();
    let warning_flags = props
        .get(&format!("compiler.warning_flags.{}", ctx.warnings_level))
        .unwrap_or("")
        .to_string();
    props.set("compiler.warning_flags", &warning_flags);
    props.set("includes", &includes.join(" "));
    props.set("source_file", &source.display().to_string());

    let relative = source
        .strip_prefix(source_path)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(source.file_name().unwrap_or_default()));
    let object_file = build_path.join(format!("{}.o", relative.display()));
    let dependency_file = build_path.join(format!("{}.d", relative.display()));
    props.set("object_file", &object_file.display().to_string());

    if let Some(parent) = object_file.parent() {
        fs::create_dir_all(parent)?;
    }

    if !obj_file_is_up_to_date(source, &object_file, &dependency_file)? {
        exec_recipe(&props, recipe, false)?;
    } else if ctx.verbose {
        info!("using previously compiled file: {}", object_file.display());
    }
    Ok(object_file)
}
