//! Buffer CLI commands: read a buffer to stdout or write stdin to a buffer.

use clap::Subcommand;
use runstream::buffer::{resolve_access_string, BufferTransfer};
use runstream::config::format_size;
use tracing::info;

use super::common::TransferArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Buffer subcommands.
#[derive(Debug, Subcommand)]
pub enum BufferCommands {
    /// Copy a buffer's contents to stdout
    Read {
        /// Access URI of the buffer, or the path of a file containing it
        access: String,

        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Copy stdin into a buffer
    Write {
        /// Writeable access URI of the buffer, or the path of a file containing it
        access: String,

        #[command(flatten)]
        transfer: TransferArgs,
    },
}

/// Run a buffer subcommand.
pub async fn run(command: BufferCommands, runner: &CliRunner) -> Result<(), CliError> {
    let (access, transfer_args, writing) = match command {
        BufferCommands::Read { access, transfer } => (access, transfer, false),
        BufferCommands::Write { access, transfer } => (access, transfer, true),
    };

    let uri = resolve_access_string(&access)?;
    let config = transfer_args.apply(runner.config().transfer_config());
    let transport = runner.block_transport(&config)?;
    let transfer = BufferTransfer::new(transport, config);
    let cancel = runner.cancel_on_ctrl_c();

    if writing {
        runner.log_startup("buffer write");
        let stats = transfer.write(&uri, tokio::io::stdin(), cancel).await?;
        info!(
            buffer = %uri,
            blocks = stats.blocks,
            size = %format_size(stats.bytes as usize),
            "Buffer written"
        );
    } else {
        runner.log_startup("buffer read");
        let stats = transfer.read(&uri, tokio::io::stdout(), cancel).await?;
        info!(
            buffer = %uri,
            blocks = stats.blocks,
            size = %format_size(stats.bytes as usize),
            "Buffer read"
        );
    }
    Ok(())
}
