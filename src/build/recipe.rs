//! Recipe expansion and execution.
//!
//! A recipe is a property value holding a `{token}`-templated command line.
//! Tokens are expanded transitively against the current build properties,
//! optionally stripping tokens that never resolved, and the result is split
//! into a command. Extremely long command lines fall back to a shortened,
//! working-directory-relative form so they stay under OS limits.

use crate::errors::{Error, Result};
use crate::props::PropertyStore;
use log::debug;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::LazyLock;

/// Command lines longer than this are rewritten relative to `build.path`.
const COMMAND_LINE_LIMIT: usize = 30_000;

static UNEXPANDED_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]+\}").unwrap_or_else(|e| panic!("{e}")));

/// A ready-to-run toolchain invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Set when the long-command-line fallback kicked in.
    pub working_dir: Option<PathBuf>,
}

impl PreparedCommand {
    /// The command as a single display string, for logs and errors.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Remove every `{token}` that survived expansion.
pub fn delete_unexpanded_tokens(command_line: &str) -> String {
    UNEXPANDED_TOKEN.replace_all(command_line, "").into_owned()
}

/// Split a command line into arguments, honoring single and double quotes.
pub fn split_command_line(command_line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    for c in command_line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

/// Expand the named recipe against `props` and split it into a command.
///
/// A missing or empty recipe pattern is [`Error::RecipePatternMissing`]. With
/// `remove_unset` the tokens that never resolved are stripped before
/// splitting.
pub fn prepare_command_for_recipe(
    props: &PropertyStore,
    recipe: &str,
    remove_unset: bool,
) -> Result<PreparedCommand> {
    let pattern = props
        .get(recipe)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::RecipePatternMissing(recipe.to_string()))?;

    let mut command_line = props.expand(pattern);
    if remove_unset {
        command_line = delete_unexpanded_tokens(&command_line);
    }

    // over the limit, shorten known paths to be relative to build.path and
    // run from there
    let working_dir = if command_line.len() > COMMAND_LINE_LIMIT {
        props.get("build.path").map(PathBuf::from)
    } else {
        None
    };

    let mut parts = split_command_line(&command_line);
    if parts.is_empty() {
        return Err(Error::EmptyCommandLine(recipe.to_string()));
    }
    if let Some(base) = &working_dir {
        parts = parts
            .into_iter()
            .map(|arg| relativize(&arg, base))
            .collect();
    }

    let program = parts.remove(0);
    Ok(PreparedCommand {
        program,
        args: parts,
        working_dir,
    })
}

fn relativize(arg: &str, base: &Path) -> String {
    match Path::new(arg).strip_prefix(base) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
        _ => arg.to_string(),
    }
}

/// Prepare and run a recipe, capturing output. A nonzero exit is
/// [`Error::ExecutionFailed`] carrying the first stderr lines.
pub fn exec_recipe(props: &PropertyStore, recipe: &str, remove_unset: bool) -> Result<Output> {
    let prepared = prepare_command_for_recipe(props, recipe, remove_unset)?;
    debug!("exec: {}", prepared.display());

    let mut command = Command::new(&prepared.program);
    command.args(&prepared.args);
    if let Some(dir) = &prepared.working_dir {
        command.current_dir(dir);
    }
    let output = command.output().map_err(|source| Error::SpawnFailed {
        command: prepared.display(),
        source,
    })?;

    if !output.status.success() {
        return Err(Error::ExecutionFailed {
            command: prepared.display(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output)
}
