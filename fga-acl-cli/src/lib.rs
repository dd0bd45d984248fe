//! # fga-acl-cli
//!
//! Command-line front end for the `sys_acl_permission` table.
//!
//! This crate provides the `fga-acl` binary with the following commands:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fga-acl query` | Run a permission query and print the matching rows |
//! | `fga-acl columns` | Describe the table schema |
//! | `fga-acl doctor` | Check that a connection profile resolves to a usable store |
//!
//! Connection profiles are read from `fga-acl.yaml` (or `--config`), keyed
//! by name. Unset fields fall back to the `OPENFGA_*` environment variables,
//! which may also come from a `.env` file.
//!
//! ## Architecture
//!
//! - [`profiles`]: connection profile file loading
//! - [`commands::query`]: predicate parsing, execution and row rendering
//! - [`commands::columns`]: schema listing
//! - [`commands::doctor`]: connection diagnostics

pub mod commands;
pub mod profiles;
