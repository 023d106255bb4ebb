//! Run logs.
//!
//! A followed log stream can drop at any byte. Every line carries a
//! timestamp prefix, so the follower remembers the last one it saw and
//! reopens the stream with `since` set to it. Lines are delivered at least
//! once; a line cut by a disconnect is closed with a newline and then
//! printed again in full.

mod follow;
mod parser;
mod query;

pub use follow::{get_logs, FollowConfig, LogError};
pub use parser::LogLineParser;
pub use query::{format_cursor, LogQuery};
