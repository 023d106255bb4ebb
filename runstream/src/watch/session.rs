//! Reconnecting status watch.
//!
//! # State Machine
//!
//! ```text
//! Connecting --[event]--> Streaming
//! Streaming  --[event]--> Streaming (error count reset)
//! Connecting/Streaming --[transient error, retries left]--> Backoff
//! Streaming  --[clean end]--> Backoff (not counted, short pause)
//! Connecting --[clean end, no events]--> Backoff or Failed (counted)
//! Backoff    --[resubscribe]--> Connecting
//! any        --[fatal error or retries exhausted]--> Failed
//! ```
//!
//! [`WatchSession`] holds only the transitions and is driven without I/O;
//! [`RunWatcher`] pairs it with [`subscribe`](super::subscribe).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::WatchError;
use super::stream::subscribe;
use crate::client::ControlPlane;
use crate::model::RunEvent;
use crate::retry::RetryPolicy;

/// Shortest pause before resubscribing after a clean end of stream.
pub const CLEAN_END_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Subscription requested, no event yet.
    Connecting,
    /// At least one event received on the current subscription.
    Streaming,
    /// Waiting to resubscribe.
    Backoff,
    /// No further subscriptions will be attempted.
    Failed,
}

/// What the driver should do after a subscription ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Resubscribe { delay: Duration },
    Fail,
}

/// Retry bookkeeping for the status watch.
#[derive(Debug, Clone)]
pub struct WatchSession {
    policy: RetryPolicy,
    state: WatchState,
    consecutive_errors: u32,
}

impl WatchSession {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: WatchState::Connecting,
            consecutive_errors: 0,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// An event arrived.
    pub fn on_event(&mut self) {
        self.consecutive_errors = 0;
        self.state = WatchState::Streaming;
    }

    /// The subscription failed with `error`.
    pub fn on_error(&mut self, error: &WatchError) -> WatchAction {
        if !error.is_transient() {
            self.state = WatchState::Failed;
            return WatchAction::Fail;
        }
        self.record_failure()
    }

    /// The subscription closed cleanly.
    pub fn on_end(&mut self) -> WatchAction {
        match self.state {
            WatchState::Streaming => {
                self.state = WatchState::Backoff;
                WatchAction::Resubscribe {
                    delay: self.policy.delay_for(1).max(CLEAN_END_DELAY),
                }
            }
            _ => self.record_failure(),
        }
    }

    /// A new subscription is being opened.
    pub fn on_resubscribe(&mut self) {
        if self.state != WatchState::Failed {
            self.state = WatchState::Connecting;
        }
    }

    fn record_failure(&mut self) -> WatchAction {
        self.consecutive_errors += 1;
        if self.policy.should_retry(self.consecutive_errors) {
            self.state = WatchState::Backoff;
            WatchAction::Resubscribe {
                delay: self.policy.delay_for(self.consecutive_errors),
            }
        } else {
            self.state = WatchState::Failed;
            WatchAction::Fail
        }
    }
}

/// Status events for one run across resubscriptions.
///
/// Dropping the watcher cancels its open subscription.
pub struct RunWatcher<C> {
    client: Arc<C>,
    run_id: i64,
    session: WatchSession,
    events: Option<mpsc::Receiver<Result<RunEvent, WatchError>>>,
    cancel: CancellationToken,
}

impl<C: ControlPlane + 'static> RunWatcher<C> {
    pub fn new(client: Arc<C>, run_id: i64, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            client,
            run_id,
            session: WatchSession::new(policy),
            events: None,
            cancel: cancel.child_token(),
        }
    }

    pub fn session(&self) -> &WatchSession {
        &self.session
    }

    /// Next status event, resubscribing as the session allows.
    ///
    /// A clean end of stream is followed by a new subscription.
    pub async fn next_event(&mut self) -> Result<RunEvent, WatchError> {
        match self.receive(false).await? {
            Some(event) => Ok(event),
            None => Err(WatchError::EndedEmpty),
        }
    }

    /// Next status event, or `None` once the service closes the stream.
    ///
    /// Errors still resubscribe as the session allows.
    pub async fn next_until_closed(&mut self) -> Result<Option<RunEvent>, WatchError> {
        self.receive(true).await
    }

    async fn receive(&mut self, stop_on_end: bool) -> Result<Option<RunEvent>, WatchError> {
        loop {
            if self.session.state() == WatchState::Failed {
                return Err(WatchError::EndedEmpty);
            }

            if self.events.is_none() {
                self.session.on_resubscribe();
                debug!(run_id = self.run_id, "Subscribing to run status");
            }
            let client = &self.client;
            let cancel = &self.cancel;
            let run_id = self.run_id;
            let events = self
                .events
                .get_or_insert_with(|| subscribe(Arc::clone(client), run_id, cancel.child_token()));

            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(WatchError::Cancelled),
                received = events.recv() => received,
            };

            let (action, error) = match received {
                Some(Ok(event)) => {
                    self.session.on_event();
                    return Ok(Some(event));
                }
                Some(Err(error)) => (self.session.on_error(&error), error),
                None if stop_on_end => {
                    self.events = None;
                    debug!(run_id = self.run_id, "Run status stream closed");
                    return Ok(None);
                }
                None => (self.session.on_end(), WatchError::EndedEmpty),
            };
            self.events = None;

            match action {
                WatchAction::Resubscribe { delay } => {
                    warn!(
                        run_id = self.run_id,
                        error = %error,
                        consecutive_errors = self.session.consecutive_errors(),
                        "Run status watch interrupted, resubscribing"
                    );
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = self.cancel.cancelled() => return Err(WatchError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
                WatchAction::Fail => return Err(error),
            }
        }
    }
}

impl<C> Drop for RunWatcher<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
