//! The incremental compilation engine.
//!
//! [`recipe`] expands `{token}`-templated command lines from build
//! properties and runs them; [`depfile`] decides per-object staleness from
//! make-style `.d` files; [`core`] drives the parallel per-kind compile
//! pipeline; [`archive`] caches the compiled core as a deterministic
//! archive; [`utils`] answers the coarse "did this tree change at all"
//! questions that guard the archive cache.

mod archive;
mod core;
mod depfile;
mod recipe;
mod utils;

pub use archive::{archive_compiled_files, build_core, cached_core_archive_file_name};
pub use core::{BuildContext, compile_files};
pub use depfile::{obj_file_is_up_to_date, parse_dep_rows};
pub use recipe::{
    PreparedCommand, delete_unexpanded_tokens, exec_recipe, prepare_command_for_recipe,
    split_command_line,
};
pub use utils::{build_rules_changed, core_tree_changed};
