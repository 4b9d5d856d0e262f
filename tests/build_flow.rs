//! End-to-end tests for the incremental compilation engine.
//!
//! These tests drive `compile_files` and `build_core` against a fake shell
//! toolchain: the "compiler" copies the source to the object and emits a
//! make-style `.d` file, the "archiver" appends objects to the archive.
//! That keeps the full pipeline observable without a real cross-compiler.

#![cfg(unix)]

use bric::build::{BuildContext, build_core, compile_files};
use bric::errors::Error;
use bric::props::PropertyStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use walkdir::WalkDir;

const CC_SH: &str = r#"#!/bin/sh
# usage: cc.sh -c <source> -o <object>
src="$2"
obj="$4"
if grep -q boom "$src"; then
    echo "compile error in $src" >&2
    exit 1
fi
cp "$src" "$obj"
printf '%s: \\\n %s\n' "$obj" "$src" > "${obj%.o}.d"
"#;

const AR_SH: &str = r#"#!/bin/sh
# usage: ar.sh rcs <archive> <object>
cat "$3" >> "$2"
"#;

struct Workbench {
    _dir: TempDir,
    sources: PathBuf,
    build: PathBuf,
    props: PropertyStore,
}

fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, body).expect("failed to write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("failed to mark script executable");
}

fn workbench() -> Workbench {
    let dir = TempDir::new().expect("failed to create temp dir");
    let tools = dir.path().join("tools");
    let sources = dir.path().join("core");
    let build = dir.path().join("build");
    fs::create_dir_all(&tools).unwrap();
    fs::create_dir_all(&sources).unwrap();
    fs::create_dir_all(&build).unwrap();
    write_script(&tools.join("cc.sh"), CC_SH);
    write_script(&tools.join("ar.sh"), AR_SH);

    let mut props = PropertyStore::new();
    props.set("compiler.path", &format!("{}/", tools.display()));
    props.set("build.path", &build.display().to_string());
    for kind in ["S", "c", "cpp"] {
        props.set(
            &format!("recipe.{kind}.o.pattern"),
            "\"{compiler.path}cc.sh\" -c {source_file} -o {object_file}",
        );
    }
    props.set(
        "recipe.ar.pattern",
        "\"{compiler.path}ar.sh\" rcs {archive_file_path} {object_file}",
    );

    Workbench {
        _dir: dir,
        sources,
        build,
        props,
    }
}

fn set_mtime(path: &Path, mtime: SystemTime) {
    let file = fs::OpenOptions::new().append(true).open(path).unwrap();
    file.set_modified(mtime).unwrap();
}

/// Every regular file under `root` with the given extension.
fn files_with_extension(root: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(extension))
        .map(|e| e.into_path())
        .collect()
}

#[test]
fn test_core_is_compiled_and_archived() {
    let wb = workbench();
    fs::create_dir(wb.sources.join("sub")).unwrap();
    fs::write(wb.sources.join("hal.c"), "int hal;\n").unwrap();
    fs::write(wb.sources.join("main.cpp"), "int main;\n").unwrap();
    fs::write(wb.sources.join("sub").join("irq.c"), "int irq;\n").unwrap();

    let ctx = BuildContext {
        jobs: 2,
        ..BuildContext::default()
    };
    let archive = build_core(
        &ctx,
        "arduino:avr:uno",
        &wb.sources,
        &wb.build,
        &wb.props,
        &[],
    )
    .expect("build failed");

    assert!(archive.exists());
    let content = fs::read_to_string(&archive).unwrap();
    for piece in ["int hal;", "int main;", "int irq;"] {
        assert!(content.contains(piece), "missing {piece} in archive");
    }
    assert!(wb.build.join("hal.c.o").exists());
    assert!(wb.build.join("sub").join("irq.c.o").exists());
    assert_eq!(files_with_extension(&wb.build, "d").len(), 3);
}

#[test]
fn test_second_build_reuses_everything() {
    let wb = workbench();
    fs::write(wb.sources.join("hal.c"), "int hal;\n").unwrap();
    fs::write(wb.sources.join("timer.c"), "int timer;\n").unwrap();

    let ctx = BuildContext::default();
    let archive = build_core(&ctx, "arduino:avr:uno", &wb.sources, &wb.build, &wb.props, &[])
        .expect("first build failed");

    // push everything into the past, keeping outputs newer than sources and
    // the archive newer than the objects
    let now = SystemTime::now();
    let source_marker = now - Duration::from_secs(100);
    let object_marker = now - Duration::from_secs(50);
    let archive_marker = now - Duration::from_secs(40);
    for source in files_with_extension(&wb.sources, "c") {
        set_mtime(&source, source_marker);
    }
    for path in files_with_extension(&wb.build, "o")
        .into_iter()
        .chain(files_with_extension(&wb.build, "d"))
    {
        set_mtime(&path, object_marker);
    }
    set_mtime(&archive, archive_marker);

    build_core(&ctx, "arduino:avr:uno", &wb.sources, &wb.build, &wb.props, &[])
        .expect("second build failed");

    for object in files_with_extension(&wb.build, "o") {
        let mtime = fs::metadata(&object).unwrap().modified().unwrap();
        assert_eq!(mtime, object_marker, "{} was recompiled", object.display());
    }
    let mtime = fs::metadata(&archive).unwrap().modified().unwrap();
    assert_eq!(mtime, archive_marker, "archive was rebuilt");
}

#[test]
fn test_touched_source_recompiles_only_itself() {
    let wb = workbench();
    fs::write(wb.sources.join("hal.c"), "int hal;\n").unwrap();
    fs::write(wb.sources.join("timer.c"), "int timer;\n").unwrap();

    let ctx = BuildContext::default();
    compile_files(&ctx, &wb.sources, true, &wb.build, &wb.props, &[]).expect("first build failed");

    let now = SystemTime::now();
    let source_marker = now - Duration::from_secs(100);
    let object_marker = now - Duration::from_secs(50);
    for source in files_with_extension(&wb.sources, "c") {
        set_mtime(&source, source_marker);
    }
    for path in files_with_extension(&wb.build, "o")
        .into_iter()
        .chain(files_with_extension(&wb.build, "d"))
    {
        set_mtime(&path, object_marker);
    }

    fs::write(wb.sources.join("timer.c"), "int timer = 2;\n").unwrap();
    compile_files(&ctx, &wb.sources, true, &wb.build, &wb.props, &[])
        .expect("second build failed");

    let hal = fs::metadata(wb.build.join("hal.c.o")).unwrap().modified().unwrap();
    assert_eq!(hal, object_marker, "untouched object was recompiled");
    let timer = fs::metadata(wb.build.join("timer.c.o")).unwrap().modified().unwrap();
    assert!(timer > object_marker, "touched object was not recompiled");
}

#[test]
fn test_compile_error_stops_the_queue() {
    let wb = workbench();
    fs::write(wb.sources.join("a.c"), "int boom;\n").unwrap();
    for name in ["b.c", "c.c", "d.c", "e.c", "f.c"] {
        fs::write(wb.sources.join(name), "int ok;\n").unwrap();
    }

    // one worker makes the schedule deterministic: a.c fails first, and
    // every source queued after it is drained without being compiled
    let ctx = BuildContext {
        jobs: 1,
        ..BuildContext::default()
    };
    let err = compile_files(&ctx, &wb.sources, true, &wb.build, &wb.props, &[])
        .expect_err("build should fail");
    match err {
        Error::ExecutionFailed { stderr, .. } => {
            assert!(stderr.contains("compile error"), "unexpected stderr: {stderr}")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!wb.build.join("a.c.o").exists());
    let compiled = files_with_extension(&wb.build, "o").len();
    assert_eq!(compiled, 0, "queue kept running after the error");
}

#[test]
fn test_single_worker_build_completes() {
    let wb = workbench();
    fs::write(wb.sources.join("hal.c"), "int hal;\n").unwrap();
    fs::write(wb.sources.join("timer.c"), "int timer;\n").unwrap();

    // the feeder shares the pool with the lone worker; the build must still
    // run to completion
    let ctx = BuildContext {
        jobs: 1,
        ..BuildContext::default()
    };
    let objects = compile_files(&ctx, &wb.sources, true, &wb.build, &wb.props, &[])
        .expect("single-worker build failed");
    assert_eq!(objects.len(), 2);
    assert!(wb.build.join("hal.c.o").exists());
    assert!(wb.build.join("timer.c.o").exists());
}

#[test]
fn test_missing_recipe_is_reported() {
    let wb = workbench();
    fs::write(wb.sources.join("main.c"), "int main;\n").unwrap();
    let mut props = wb.props.clone();
    props.remove("recipe.c.o.pattern");

    let ctx = BuildContext::default();
    let err = compile_files(&ctx, &wb.sources, true, &wb.build, &props, &[])
        .expect_err("build should fail");
    assert!(matches!(
        err,
        Error::RecipePatternMissing(recipe) if recipe == "recipe.c.o.pattern"
    ));
}

#[test]
fn test_includes_reach_the_recipe() {
    let wb = workbench();
    fs::write(wb.sources.join("main.c"), "int main;\n").unwrap();
    let mut props = wb.props.clone();
    // echo the includes into the object so the test can see them
    props.set(
        "recipe.c.o.pattern",
        "\"{compiler.path}cc.sh\" -c {source_file} -o {object_file} {includes}",
    );

    let ctx = BuildContext::default();
    let includes = ["-I/opt/core".to_string(), "-I/opt/variant".to_string()];
    compile_files(&ctx, &wb.sources, true, &wb.build, &props, &includes)
        .expect("build failed");
    assert!(wb.build.join("main.c.o").exists());
}
