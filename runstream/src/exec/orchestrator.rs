//! Execution orchestrator.
//!
//! # Lifecycle
//!
//! ```text
//! Created --[submitted, tasks spawned]--> Watching
//! Watching --[Pending | ContainerCreating | Running]--> Watching
//! Watching --[Succeeded]--> TerminalSuccess   (join every task)
//! Watching --[other status | fatal error]--> TerminalFailure (cancel, join with timeout)
//! ```
//!
//! Only the status watch decides when the run is over. The buffer transfers
//! and the log follower run beside it, each under a child of one
//! cancellation token.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::ExecConfig;
use super::error::ExecError;
use super::preflight::preflight;
use crate::buffer::{BlockTransport, BufferTransfer, CapabilityUri, TransferError, TransferStats};
use crate::client::{create_run, get_buffer_access_uri, ControlPlane};
use crate::logs::{get_logs, LogError, LogQuery};
use crate::model::{Run, RunEvent, RunStatus};
use crate::watch::{RunWatcher, WatchError};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Local ends of the run's data streams.
pub struct ExecStreams {
    /// Copied into the input buffer, if the job has one.
    pub input: BoxedReader,
    /// Receives the output buffer, if the job has one.
    pub output: BoxedWriter,
    /// Receives the run's logs when set.
    pub logs: Option<BoxedWriter>,
}

impl ExecStreams {
    /// Standard input, standard output and, with `logs`, standard error.
    pub fn stdio(logs: bool) -> Self {
        Self {
            input: Box::new(tokio::io::stdin()),
            output: Box::new(tokio::io::stdout()),
            logs: logs.then(|| Box::new(tokio::io::stderr()) as BoxedWriter),
        }
    }
}

/// Result of a successful [`Orchestrator::exec`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The run as committed by the service.
    pub run: Run,
    /// The event that ended the watch.
    pub final_event: RunEvent,
    pub input: Option<TransferStats>,
    pub output: Option<TransferStats>,
}

enum TaskOutcome {
    Input(Result<TransferStats, TransferError>),
    Output(Result<TransferStats, TransferError>),
    Logs(Result<(), LogError>),
}

/// What the watch loop concluded.
enum Verdict {
    Succeeded(RunEvent),
    Failed(ExecError),
}

/// Submits runs and drives their data and control streams.
pub struct Orchestrator<C, T> {
    client: Arc<C>,
    transfer: BufferTransfer<T>,
    config: ExecConfig,
}

impl<C, T> Orchestrator<C, T>
where
    C: ControlPlane + 'static,
    T: BlockTransport,
{
    pub fn new(client: Arc<C>, transport: Arc<T>, config: ExecConfig) -> Self {
        Self {
            client,
            transfer: BufferTransfer::new(transport, *config.transfer()),
            config,
        }
    }

    /// Validate, submit and execute `new_run`, streaming `streams` through
    /// its buffers until the run reaches a terminal status.
    pub async fn exec(
        &self,
        new_run: &Run,
        streams: ExecStreams,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, ExecError> {
        let bindings = preflight(self.client.as_ref(), new_run).await?;
        debug!(input = ?bindings.input, output = ?bindings.output, "Buffer parameters bound");

        let run = create_run(self.client.as_ref(), new_run).await?;
        info!(run_id = run.id, "Run created");

        let input_uri = match bindings.input {
            Some(ref param) => Some(self.access_uri(&run, param, true).await?),
            None => None,
        };
        let output_uri = match bindings.output {
            Some(ref param) => Some(self.access_uri(&run, param, false).await?),
            None => None,
        };

        let tasks_token = cancel.child_token();
        let mut tasks = self.spawn_tasks(&run, input_uri, output_uri, streams, &tasks_token);

        let mut outcome = RunOutcome {
            final_event: RunEvent {
                id: run.id,
                status: RunStatus::Pending,
                status_reason: None,
                running_count: None,
            },
            run,
            input: None,
            output: None,
        };

        let watch_token = tasks_token.child_token();
        let verdict = self
            .watch(&mut outcome, &mut tasks, &cancel, watch_token.clone())
            .await;
        // The status stream is no longer needed once a verdict is reached.
        watch_token.cancel();

        match verdict {
            Verdict::Succeeded(event) => {
                outcome.final_event = event;
                debug!(remaining = tasks.len(), "Run succeeded, waiting for tasks");
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = record_task(joined, &mut outcome) {
                        shutdown(&tasks_token, &mut tasks, self.config.shutdown_timeout()).await;
                        return Err(e);
                    }
                }
                Ok(outcome)
            }
            Verdict::Failed(err) => {
                error!(run_id = outcome.run.id, error = %err, "Run execution failed");
                shutdown(&tasks_token, &mut tasks, self.config.shutdown_timeout()).await;
                Err(err)
            }
        }
    }

    async fn access_uri(
        &self,
        run: &Run,
        parameter: &str,
        writeable: bool,
    ) -> Result<CapabilityUri, ExecError> {
        let buffer_id = run
            .job
            .buffers
            .get(parameter)
            .ok_or_else(|| ExecError::UnboundBuffer(parameter.to_string()))?;

        let uri = get_buffer_access_uri(self.client.as_ref(), buffer_id, writeable).await?;
        let uri = CapabilityUri::parse(&uri).map_err(|source| ExecError::InvalidAccessUri {
            parameter: parameter.to_string(),
            source,
        })?;
        debug!(parameter, buffer_id = %buffer_id, writeable, uri = %uri, "Buffer access granted");
        Ok(uri)
    }

    fn spawn_tasks(
        &self,
        run: &Run,
        input_uri: Option<CapabilityUri>,
        output_uri: Option<CapabilityUri>,
        streams: ExecStreams,
        token: &CancellationToken,
    ) -> JoinSet<TaskOutcome> {
        let mut tasks = JoinSet::new();
        let ExecStreams {
            input,
            output,
            logs,
        } = streams;

        if let Some(uri) = input_uri {
            let transfer = self.transfer.clone();
            let cancel = token.child_token();
            tasks.spawn(async move { TaskOutcome::Input(transfer.write(&uri, input, cancel).await) });
        }

        if let Some(uri) = output_uri {
            let transfer = self.transfer.clone();
            let cancel = token.child_token();
            tasks.spawn(async move { TaskOutcome::Output(transfer.read(&uri, output, cancel).await) });
        }

        if let Some(sink) = logs {
            let client = Arc::clone(&self.client);
            let run_id = run.id;
            let query = LogQuery::new()
                .with_follow(true)
                .with_timestamps(self.config.log_timestamps());
            let follow = *self.config.follow();
            let cancel = token.child_token();
            tasks.spawn(async move {
                TaskOutcome::Logs(
                    get_logs(client.as_ref(), run_id, &query, &follow, sink, cancel).await,
                )
            });
        }

        tasks
    }

    /// Follow the run's status until it is terminal. Task completions are
    /// recorded as they happen; a transfer failure ends the watch.
    async fn watch(
        &self,
        outcome: &mut RunOutcome,
        tasks: &mut JoinSet<TaskOutcome>,
        cancel: &CancellationToken,
        watch_token: CancellationToken,
    ) -> Verdict {
        let run_id = outcome.run.id;
        let mut watcher = RunWatcher::new(
            Arc::clone(&self.client),
            run_id,
            self.config.watch_policy(),
            watch_token,
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Verdict::Failed(ExecError::Cancelled),

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = record_task(joined, outcome) {
                        return Verdict::Failed(e);
                    }
                }

                event = watcher.next_event() => {
                    let event = match event {
                        Ok(event) => event,
                        Err(WatchError::Cancelled) => return Verdict::Failed(ExecError::Cancelled),
                        Err(e) => return Verdict::Failed(ExecError::Watch(e)),
                    };

                    info!(
                        run_id,
                        status = %event.status,
                        running_count = ?event.running_count,
                        "Run status changed"
                    );

                    if event.status.is_success() {
                        return Verdict::Succeeded(event);
                    }
                    if !event.status.is_in_progress() {
                        return Verdict::Failed(ExecError::RunFailed {
                            run_id,
                            status: event.status,
                            reason: event.status_reason,
                        });
                    }
                }
            }
        }
    }
}

/// Store a finished task's result. Transfer failures are fatal; log
/// failures are reported and otherwise ignored.
fn record_task(
    joined: Result<TaskOutcome, tokio::task::JoinError>,
    outcome: &mut RunOutcome,
) -> Result<(), ExecError> {
    match joined {
        Ok(TaskOutcome::Input(result)) => {
            let stats = result?;
            debug!(blocks = stats.blocks, bytes = stats.bytes, "Input buffer written");
            outcome.input = Some(stats);
        }
        Ok(TaskOutcome::Output(result)) => {
            let stats = result?;
            debug!(blocks = stats.blocks, bytes = stats.bytes, "Output buffer read");
            outcome.output = Some(stats);
        }
        Ok(TaskOutcome::Logs(Ok(()))) => debug!("Log stream finished"),
        Ok(TaskOutcome::Logs(Err(e))) => error!(error = %e, "Failed to get logs"),
        Err(e) if e.is_panic() => return Err(ExecError::TaskPanicked(e.to_string())),
        Err(_) => {}
    }
    Ok(())
}

/// Cancel every task and give them `timeout` to stop before aborting.
async fn shutdown(token: &CancellationToken, tasks: &mut JoinSet<TaskOutcome>, timeout: Duration) {
    token.cancel();
    let drained = tokio::time::timeout(timeout, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            remaining = tasks.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Tasks did not stop in time, aborting"
        );
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }
}
