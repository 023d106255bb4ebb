//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`buffer`] - Buffer data transfer (read, write)
//! - [`run`] - Run management (exec, create, show, watch, logs)

pub mod buffer;
pub mod common;
pub mod run;
