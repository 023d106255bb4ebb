//! Run execution: submit a run, stream its buffers and logs, and watch it
//! to a terminal status.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use runstream::exec::{ExecConfig, ExecStreams, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(client, transport, ExecConfig::default());
//! let outcome = orchestrator
//!     .exec(&new_run, ExecStreams::stdio(true), cancel)
//!     .await?;
//! ```

mod config;
mod error;
mod orchestrator;
mod preflight;

pub use config::ExecConfig;
pub use error::ExecError;
pub use orchestrator::{BoxedReader, BoxedWriter, ExecStreams, Orchestrator, RunOutcome};
pub use preflight::{bind_buffers, preflight, BufferBindings};
