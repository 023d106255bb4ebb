//! Configuration for runstream components.
//!
//! Two layers live here:
//!
//! - [`ConfigFile`]: the user's `~/.runstream/config.ini`, parsed section by
//!   section with environment overrides applied on load
//! - Runtime config objects such as [`TransferConfig`], derived from the file
//!   and handed to the components that need them
//!
//! # Example
//!
//! ```
//! use runstream::config::{ConfigFile, TransferConfig};
//!
//! let file = ConfigFile::default();
//! let transfer: TransferConfig = file.transfer_config();
//! assert_eq!(transfer.write_dop(), 16);
//! ```

pub mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod transfer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, ExecSettings, LoggingSettings, LogsSettings, ServerSettings, TransferSettings,
    WatchSettings,
};
pub use size::{format_size, parse_size, Size, SizeParseError};
pub use transfer::TransferConfig;
