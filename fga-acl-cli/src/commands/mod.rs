//! Command implementations for the `fga-acl` CLI.
//!
//! Each submodule corresponds to a top-level CLI command.

/// Schema listing: `fga-acl columns`.
pub mod columns;

/// Connection diagnostics: `fga-acl doctor`.
///
/// Resolves a connection profile, then connects to validate the store and
/// authorization model it points at.
pub mod doctor;

/// Permission queries: `fga-acl query`.
///
/// Turns column flags into predicates, streams the matching rows to stdout
/// and stops cleanly on Ctrl-C.
pub mod query;
