//! # bric - Board-Resolved Incremental Compilation
//!
//! bric is the core engine of an embedded build system: it turns a board
//! identifier plus a tree of platform configuration files into concrete
//! compiler invocations, and runs only the ones whose outputs are stale.
//!
//! ## Features
//!
//! - **Ordered Properties**: `key=value` stores that keep definition order
//!   and expand `{token}` references recursively
//! - **Board Resolution**: FQBN parsing and menu-option layering into final
//!   build properties
//! - **Dependency Resolution**: Platform releases, tool dependencies, and
//!   verified resumable downloads
//! - **Incremental Builds**: Parallel per-kind compilation gated by
//!   make-style `.d` files, with a cached core archive
//! - **Header Resolution**: Include-to-library matching with tiered name
//!   heuristics and architecture priorities
//!
//! ## Module Organization
//!
//! - [`props`] - Ordered property stores and `{token}` expansion
//! - [`fqbn`] - Fully qualified board name parsing
//! - [`board`] - Board definitions and build property resolution
//! - [`platform`] - Package index, platforms, tools, and their releases
//! - [`download`] - Verified, resumable resource downloads and checksums
//! - [`build`] - The incremental compilation engine
//! - [`library`] - Library metadata and architecture priorities
//! - [`resolver`] - Header-to-library resolution
//! - [`registry`] - Handle-based instance registry for RPC-style frontends

/// Board definitions and build property resolution.
pub mod board;

/// The incremental compilation engine.
pub mod build;

/// Verified, resumable resource downloads and checksums.
pub mod download;

/// Error taxonomy shared by the whole crate.
pub mod errors;

/// Fully qualified board name parsing.
pub mod fqbn;

/// Library metadata and architecture priorities.
pub mod library;

/// Package index, platforms, tools, and their releases.
pub mod platform;

/// Progress reporting types for long-running operations.
pub mod progress;

/// Ordered property stores and `{token}` expansion.
pub mod props;

/// Handle-based instance registry for RPC-style frontends.
pub mod registry;

/// Header-to-library resolution.
pub mod resolver;
