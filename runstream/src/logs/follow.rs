//! Log retrieval and reconnecting follow.

use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::parser::LogLineParser;
use super::query::LogQuery;
use crate::client::{ApiError, ControlPlane};
use crate::config::defaults::DEFAULT_LOG_RECONNECT_DELAY_MS;
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("run {0} not found")]
    RunNotFound(i64),

    #[error("unable to get logs: {0}")]
    Api(ApiError),

    #[error("error writing logs: {0}")]
    Sink(#[source] std::io::Error),

    #[error("log stream cancelled")]
    Cancelled,
}

impl LogError {
    fn from_api(run_id: i64, err: ApiError) -> Self {
        if err.is_not_found() {
            LogError::RunNotFound(run_id)
        } else {
            LogError::Api(err)
        }
    }
}

/// Reconnect behavior for followed logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowConfig {
    reconnect_delay: Duration,
}

impl FollowConfig {
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Reconnects are never exhausted; only cancellation or a fatal
    /// response ends a follow.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::unbounded().with_delay(self.reconnect_delay)
    }
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(DEFAULT_LOG_RECONNECT_DELAY_MS),
        }
    }
}

/// Why one follow connection stopped.
enum Interruption {
    Ended,
    Broken(String),
}

/// Copy the logs of `run_id` to `sink`.
///
/// Without `follow` the response body is copied verbatim. With `follow` the
/// stream is parsed line by line and reopened from the last seen timestamp
/// whenever it drops or ends inside a line; a clean end on a line boundary
/// completes the call.
pub async fn get_logs<C, W>(
    client: &C,
    run_id: i64,
    query: &LogQuery,
    config: &FollowConfig,
    mut sink: W,
    cancel: CancellationToken,
) -> Result<(), LogError>
where
    C: ControlPlane,
    W: AsyncWrite + Unpin,
{
    if !query.follow {
        return tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LogError::Cancelled),
            result = copy_logs(client, run_id, query, &mut sink) => result,
        };
    }

    let policy = config.retry_policy();
    let mut parser = LogLineParser::new(query.timestamps);
    let mut request = query.clone();
    let mut failures = 0u32;

    loop {
        let interruption = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LogError::Cancelled),
            result = follow_once(client, run_id, &request, &mut parser, &mut sink) => result?,
        };

        let reason = match interruption {
            Interruption::Ended if !parser.is_mid_line() => {
                debug!(run_id, "Log stream complete");
                return Ok(());
            }
            Interruption::Ended => "stream ended mid-line".to_string(),
            Interruption::Broken(reason) => reason,
        };

        let mut tail = Vec::new();
        parser.interrupt(&mut tail);
        write_out(&mut sink, &tail).await?;

        if let Some(cursor) = parser.cursor() {
            request = query.resume_from(cursor);
        }

        failures += 1;
        if !policy.should_retry(failures) {
            return Err(LogError::Api(ApiError::Stream(reason)));
        }
        warn!(run_id, reason = %reason, since = ?request.since, "Log stream interrupted, reconnecting");

        tokio::select! {
            _ = cancel.cancelled() => return Err(LogError::Cancelled),
            _ = tokio::time::sleep(policy.delay_for(failures)) => {}
        }
    }
}

async fn copy_logs<C, W>(
    client: &C,
    run_id: i64,
    query: &LogQuery,
    sink: &mut W,
) -> Result<(), LogError>
where
    C: ControlPlane,
    W: AsyncWrite + Unpin,
{
    let mut body = client
        .open_stream(&query.path(run_id))
        .await
        .map_err(|e| LogError::from_api(run_id, e))?;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(LogError::Api)?;
        write_out(sink, &chunk).await?;
    }
    Ok(())
}

/// One follow connection. Transient failures come back as an
/// [`Interruption`]; anything else is an error.
async fn follow_once<C, W>(
    client: &C,
    run_id: i64,
    request: &LogQuery,
    parser: &mut LogLineParser,
    sink: &mut W,
) -> Result<Interruption, LogError>
where
    C: ControlPlane,
    W: AsyncWrite + Unpin,
{
    let mut body = match client.open_stream(&request.path(run_id)).await {
        Ok(body) => body,
        Err(e) if e.is_transient() => return Ok(Interruption::Broken(e.to_string())),
        Err(e) => return Err(LogError::from_api(run_id, e)),
    };
    debug!(run_id, since = ?request.since, "Log stream opened");

    let mut out = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Ok(Interruption::Broken(e.to_string())),
        };
        out.clear();
        parser.push(&chunk, &mut out);
        write_out(sink, &out).await?;
    }
    Ok(Interruption::Ended)
}

async fn write_out<W: AsyncWrite + Unpin>(sink: &mut W, bytes: &[u8]) -> Result<(), LogError> {
    if bytes.is_empty() {
        return Ok(());
    }
    sink.write_all(bytes).await.map_err(LogError::Sink)?;
    sink.flush().await.map_err(LogError::Sink)
}
