//! Run CLI commands: exec, create, show, watch and logs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use runstream::client::{create_run, get_run};
use runstream::exec::{ExecStreams, Orchestrator};
use runstream::logs::{get_logs, LogQuery};
use runstream::model::{CodespecRef, Run, RunCodeTarget};
use runstream::watch::RunWatcher;
use tracing::info;

use super::common::{parse_duration, parse_key_value, parse_timestamp, TransferArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run subcommands.
#[derive(Debug, Subcommand)]
pub enum RunCommands {
    /// Create a run and stream its buffers through stdin and stdout
    ///
    /// The job's single input buffer, if any, is fed from stdin and its
    /// single output buffer, if any, is copied to stdout. Returns once the
    /// run has succeeded and all data has been transferred.
    Exec {
        #[command(flatten)]
        definition: RunDefinitionArgs,

        /// Write the run's logs to stderr while it executes
        #[arg(long)]
        logs: bool,

        /// Keep the timestamp prefix on each log line
        #[arg(long)]
        timestamps: bool,

        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Create a run and print its ID
    Create {
        #[command(flatten)]
        definition: RunDefinitionArgs,
    },

    /// Show a run as JSON
    Show {
        /// Run ID
        id: i64,
    },

    /// Print a run's status changes as JSON lines until the run ends
    Watch {
        /// Run ID
        id: i64,
    },

    /// Print a run's logs
    Logs {
        /// Run ID
        id: i64,

        #[command(flatten)]
        args: LogArgs,
    },
}

/// Flags describing a new run. Flags override values from `--file`.
#[derive(Debug, Clone, Default, Args)]
pub struct RunDefinitionArgs {
    /// JSON file with the run definition
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Name of the job codespec
    #[arg(short = 'c', long)]
    pub codespec: Option<String>,

    /// Version of the job codespec
    #[arg(long, requires = "codespec")]
    pub version: Option<String>,

    /// Number of job replicas
    #[arg(short = 'r', long)]
    pub replicas: Option<u32>,

    /// Node pool for the job
    #[arg(long)]
    pub node_pool: Option<String>,

    /// Bind a buffer parameter to a buffer ID, as PARAMETER=BUFFER_ID
    #[arg(short = 'b', long = "buffer", value_parser = parse_key_value)]
    pub buffers: Vec<(String, String)>,

    /// Name of the worker codespec
    #[arg(long)]
    pub worker_codespec: Option<String>,

    /// Version of the worker codespec
    #[arg(long, requires = "worker_codespec")]
    pub worker_version: Option<String>,

    /// Number of worker replicas
    #[arg(long)]
    pub worker_replicas: Option<u32>,

    /// Node pool for the workers
    #[arg(long)]
    pub worker_node_pool: Option<String>,

    /// Cluster to run on
    #[arg(long)]
    pub cluster: Option<String>,

    /// Maximum run duration (e.g. 90s, 15m, 2h)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,
}

impl RunDefinitionArgs {
    /// Build the run to submit.
    pub fn build_run(&self) -> Result<Run, CliError> {
        let mut run = match self.file {
            Some(ref path) => read_run_file(path)?,
            None => Run::default(),
        };

        if let Some(ref name) = self.codespec {
            run.job.codespec = Some(CodespecRef::named(name, self.version.as_deref()));
        }
        if self.replicas.is_some() {
            run.job.replicas = self.replicas;
        }
        if self.node_pool.is_some() {
            run.job.node_pool = self.node_pool.clone();
        }
        run.job.buffers.extend(self.buffers.iter().cloned());

        let has_worker_flags = self.worker_codespec.is_some()
            || self.worker_replicas.is_some()
            || self.worker_node_pool.is_some();
        if has_worker_flags {
            let worker = run.worker.get_or_insert_with(RunCodeTarget::default);
            if let Some(ref name) = self.worker_codespec {
                worker.codespec = Some(CodespecRef::named(name, self.worker_version.as_deref()));
            }
            if self.worker_replicas.is_some() {
                worker.replicas = self.worker_replicas;
            }
            if self.worker_node_pool.is_some() {
                worker.node_pool = self.worker_node_pool.clone();
            }
        }

        if self.cluster.is_some() {
            run.cluster = self.cluster.clone();
        }
        if let Some(timeout) = self.timeout {
            run.timeout_seconds = Some(timeout.as_secs());
        }

        Ok(run)
    }
}

fn read_run_file(path: &Path) -> Result<Run, CliError> {
    let contents = std::fs::read_to_string(path).map_err(|error| CliError::RunFile {
        path: path.display().to_string(),
        error,
    })?;
    let mut run: Run = serde_json::from_str(&contents).map_err(|e| {
        CliError::InvalidArgument(format!(
            "run file '{}' is not a valid run definition: {}",
            path.display(),
            e
        ))
    })?;

    set_inline_kind(&mut run.job, "job");
    if let Some(ref mut worker) = run.worker {
        set_inline_kind(worker, "worker");
    }
    Ok(run)
}

/// Inline codespecs in a run file take their kind from the target they sit in.
fn set_inline_kind(target: &mut RunCodeTarget, kind: &str) {
    if let Some(CodespecRef::Inline(ref mut codespec)) = target.codespec {
        codespec.kind = Some(kind.to_string());
    }
}

/// Log retrieval flags.
#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Prefix each line with its timestamp
    #[arg(long)]
    pub timestamps: bool,

    /// Only print the last N lines (-1 for all)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub tail: i64,

    /// Only print lines at or after this RFC 3339 timestamp
    #[arg(short = 's', long, value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,

    /// Keep printing new lines until the run ends
    #[arg(short = 'f', long)]
    pub follow: bool,
}

impl LogArgs {
    pub fn to_query(&self) -> LogQuery {
        let query = LogQuery::new()
            .with_timestamps(self.timestamps)
            .with_tail_lines(self.tail)
            .with_follow(self.follow);
        match self.since {
            Some(since) => query.with_since(since),
            None => query,
        }
    }
}

/// Run a run subcommand.
pub async fn run(command: RunCommands, runner: &CliRunner) -> Result<(), CliError> {
    match command {
        RunCommands::Exec {
            definition,
            logs,
            timestamps,
            transfer,
        } => {
            runner.log_startup("run exec");
            run_exec(runner, &definition, logs, timestamps, &transfer).await
        }
        RunCommands::Create { definition } => {
            runner.log_startup("run create");
            run_create(runner, &definition).await
        }
        RunCommands::Show { id } => run_show(runner, id).await,
        RunCommands::Watch { id } => run_watch(runner, id).await,
        RunCommands::Logs { id, args } => run_logs(runner, id, &args).await,
    }
}

async fn run_exec(
    runner: &CliRunner,
    definition: &RunDefinitionArgs,
    logs: bool,
    timestamps: bool,
    transfer: &TransferArgs,
) -> Result<(), CliError> {
    let new_run = definition.build_run()?;
    let client = runner.control_plane()?;

    let base = runner.config().exec_config();
    let exec_config = base
        .with_transfer(transfer.apply(*base.transfer()))
        .with_log_timestamps(timestamps);
    let transport = runner.block_transport(exec_config.transfer())?;

    let cancel = runner.cancel_on_ctrl_c();
    let orchestrator = Orchestrator::new(client, transport, exec_config);
    let outcome = orchestrator
        .exec(&new_run, ExecStreams::stdio(logs), cancel)
        .await?;

    info!(
        run_id = outcome.run.id,
        status = %outcome.final_event.status,
        input_bytes = outcome.input.map(|s| s.bytes),
        output_bytes = outcome.output.map(|s| s.bytes),
        "Run complete"
    );
    Ok(())
}

async fn run_create(runner: &CliRunner, definition: &RunDefinitionArgs) -> Result<(), CliError> {
    let new_run = definition.build_run()?;
    let client = runner.control_plane()?;

    let run = create_run(client.as_ref(), &new_run).await?;
    info!(run_id = run.id, "Run created");
    println!("{}", run.id);
    Ok(())
}

async fn run_show(runner: &CliRunner, id: i64) -> Result<(), CliError> {
    let client = runner.control_plane()?;
    let run = get_run(client.as_ref(), id).await?;
    let json = serde_json::to_string_pretty(&run)
        .map_err(|e| CliError::Output(std::io::Error::other(e)))?;
    println!("{}", json);
    Ok(())
}

async fn run_watch(runner: &CliRunner, id: i64) -> Result<(), CliError> {
    let client = runner.control_plane()?;
    let policy = runner.config().exec_config().watch_policy();
    let mut watcher = RunWatcher::new(client, id, policy, runner.cancel_on_ctrl_c());

    while let Some(event) = watcher.next_until_closed().await? {
        let json =
            serde_json::to_string(&event).map_err(|e| CliError::Output(std::io::Error::other(e)))?;
        println!("{}", json);
    }
    Ok(())
}

async fn run_logs(runner: &CliRunner, id: i64, args: &LogArgs) -> Result<(), CliError> {
    let client = runner.control_plane()?;
    get_logs(
        client.as_ref(),
        id,
        &args.to_query(),
        &runner.config().follow_config(),
        tokio::io::stdout(),
        runner.cancel_on_ctrl_c(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_build_run_from_flags() {
        let args = RunDefinitionArgs {
            codespec: Some("echo".to_string()),
            version: Some("3".to_string()),
            replicas: Some(2),
            buffers: vec![("input".to_string(), "b1".to_string())],
            cluster: Some("east".to_string()),
            timeout: Some(Duration::from_secs(600)),
            ..Default::default()
        };

        let run = args.build_run().unwrap();
        assert_eq!(
            run.job.codespec,
            Some(CodespecRef::Named("echo/versions/3".to_string()))
        );
        assert_eq!(run.job.replicas, Some(2));
        assert_eq!(run.job.buffers.get("input").map(String::as_str), Some("b1"));
        assert_eq!(run.cluster.as_deref(), Some("east"));
        assert_eq!(run.timeout_seconds, Some(600));
        assert!(run.worker.is_none());
    }

    #[test]
    fn test_worker_flags_create_worker() {
        let args = RunDefinitionArgs {
            codespec: Some("job".to_string()),
            worker_codespec: Some("server".to_string()),
            worker_replicas: Some(4),
            ..Default::default()
        };

        let worker = args.build_run().unwrap().worker.unwrap();
        assert_eq!(worker.codespec, Some(CodespecRef::Named("server".to_string())));
        assert_eq!(worker.replicas, Some(4));
    }

    #[test]
    fn test_flags_override_run_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"job":{{"codespec":"from-file","replicas":1,"buffers":{{"input":"a"}}}},"cluster":"west"}}"#
        )
        .unwrap();

        let args = RunDefinitionArgs {
            file: Some(file.path().to_path_buf()),
            replicas: Some(5),
            buffers: vec![("output".to_string(), "b".to_string())],
            ..Default::default()
        };

        let run = args.build_run().unwrap();
        assert_eq!(run.job.codespec, Some(CodespecRef::Named("from-file".to_string())));
        assert_eq!(run.job.replicas, Some(5));
        assert_eq!(run.job.buffers.len(), 2);
        assert_eq!(run.cluster.as_deref(), Some("west"));
    }

    #[test]
    fn test_inline_codespecs_from_file_get_kind() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"job":{{"codespec":{{"kind":"worker","image":"ubuntu"}}}},"worker":{{"codespec":{{"image":"nginx"}}}}}}"#
        )
        .unwrap();

        let args = RunDefinitionArgs {
            file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let run = args.build_run().unwrap();

        match run.job.codespec {
            Some(CodespecRef::Inline(ref codespec)) => {
                assert_eq!(codespec.kind.as_deref(), Some("job"));
                assert_eq!(codespec.image.as_deref(), Some("ubuntu"));
            }
            ref other => panic!("expected inline job codespec, got {:?}", other),
        }
        match run.worker.and_then(|w| w.codespec) {
            Some(CodespecRef::Inline(codespec)) => {
                assert_eq!(codespec.kind.as_deref(), Some("worker"));
            }
            other => panic!("expected inline worker codespec, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_run_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let args = RunDefinitionArgs {
            file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            args.build_run(),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_log_args_query() {
        let args = LogArgs {
            timestamps: false,
            tail: 20,
            since: None,
            follow: true,
        };
        assert_eq!(
            args.to_query().to_query_string(),
            "timestamps=true&tailLines=20&follow=true"
        );

        let all = LogArgs {
            timestamps: false,
            tail: -1,
            since: None,
            follow: false,
        };
        assert_eq!(all.to_query().to_query_string(), "");
    }
}
