//! runstream CLI - Command-line interface
//!
//! This binary provides a command-line interface to the runstream library:
//! executing runs with their buffers wired to stdin and stdout, and
//! inspecting runs, their status and their logs.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::buffer::BufferCommands;
use commands::run::RunCommands;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "runstream")]
#[command(about = "Execute remote batch runs and stream their data", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.runstream/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, execute and inspect runs
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },

    /// Read and write buffers directly
    Buffer {
        #[command(subcommand)]
        command: BufferCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        e.exit();
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let runner = CliRunner::new(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Run { command } => commands::run::run(command, &runner).await,
        Commands::Buffer { command } => commands::buffer::run(command, &runner).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_exec() {
        let cli = Cli::try_parse_from([
            "runstream",
            "run",
            "exec",
            "-c",
            "echo",
            "--version",
            "2",
            "-b",
            "input=b1",
            "--logs",
            "--block-size",
            "1M",
            "--write-dop",
            "4",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                command:
                    RunCommands::Exec {
                        definition,
                        logs,
                        transfer,
                        ..
                    },
            } => {
                assert_eq!(definition.codespec.as_deref(), Some("echo"));
                assert_eq!(definition.version.as_deref(), Some("2"));
                assert_eq!(definition.buffers, vec![("input".to_string(), "b1".to_string())]);
                assert!(logs);
                assert_eq!(transfer.block_size.map(|s| s.bytes()), Some(1024 * 1024));
                assert_eq!(transfer.write_dop.map(|d| d.get()), Some(4));
            }
            _ => panic!("expected run exec"),
        }
    }

    #[test]
    fn test_parse_logs_defaults() {
        let cli = Cli::try_parse_from(["runstream", "run", "logs", "12"]).unwrap();
        match cli.command {
            Commands::Run {
                command: RunCommands::Logs { id, args },
            } => {
                assert_eq!(id, 12);
                assert_eq!(args.tail, -1);
                assert!(!args.follow);
            }
            _ => panic!("expected run logs"),
        }
    }

    #[test]
    fn test_parse_create_short_file_flag() {
        let cli = Cli::try_parse_from(["runstream", "run", "create", "-f", "run.json"]).unwrap();
        match cli.command {
            Commands::Run {
                command: RunCommands::Create { definition },
            } => {
                assert_eq!(definition.file, Some(PathBuf::from("run.json")));
            }
            _ => panic!("expected run create"),
        }
    }

    #[test]
    fn test_zero_dop_rejected() {
        assert!(Cli::try_parse_from(["runstream", "buffer", "write", "uri", "--write-dop", "0"])
            .is_err());
    }
}
