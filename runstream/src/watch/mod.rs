//! Run status watch.
//!
//! `GET v1/runs/{id}?watch=true` answers with one JSON run snapshot per line
//! for as long as the connection stays open. [`subscribe`] turns one such
//! response into an ordered queue of [`RunEvent`](crate::model::RunEvent)s;
//! [`RunWatcher`] resubscribes after interruptions as its [`WatchSession`]
//! allows.

mod error;
mod session;
mod stream;

pub use error::WatchError;
pub use session::{RunWatcher, WatchAction, WatchSession, WatchState};
pub use stream::{subscribe, LineDecoder};
