//! runstream - streaming data and control plane for remote batch runs
//!
//! This library moves byte streams into and out of a run's buffers and
//! follows the run's status and logs while it executes.
//!
//! # High-Level API
//!
//! For most use cases, the [`exec`] module provides the whole flow:
//!
//! ```ignore
//! use std::sync::Arc;
//! use runstream::buffer::HttpBlockTransport;
//! use runstream::client::HttpControlPlane;
//! use runstream::config::ConfigFile;
//! use runstream::exec::{ExecStreams, Orchestrator};
//!
//! let config = ConfigFile::load()?;
//! let client = Arc::new(HttpControlPlane::new(&server_uri, config.server.token.clone())?);
//! let transport = Arc::new(HttpBlockTransport::new(config.transfer_config().block_timeout())?);
//!
//! let orchestrator = Orchestrator::new(client, transport, config.exec_config());
//! let outcome = orchestrator.exec(&new_run, ExecStreams::stdio(true), cancel).await?;
//! ```
//!
//! The building blocks are usable on their own:
//!
//! - [`buffer`]: block-wise buffer reads and writes
//! - [`watch`]: reconnecting run status stream
//! - [`logs`]: log retrieval and resumable follow
//! - [`client`]: the control-plane requests everything else is built on

pub mod buffer;
pub mod client;
pub mod config;
pub mod exec;
pub mod logging;
pub mod logs;
pub mod model;
pub mod retry;
pub mod watch;

/// Version of the runstream library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
