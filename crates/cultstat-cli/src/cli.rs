//! CLI argument definitions for cultstat.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Run one refresh cycle and print the status |
//! | `watch` | Refresh on the configured interval until interrupted |
//! | `validate` | Check the nickname and API key, or replace the key |
//! | `tracked` | List, add or remove tracked creations |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | `cultstat.toml` | Configuration file |
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Use canned offline responses |
//! | `--log-level` | config `[log]` | Tracing filter directive |
//!
//! # Examples
//!
//! ```bash
//! cultstat fetch --pretty
//! cultstat watch --cycles 4 --format table
//! cultstat tracked add https://cults3d.com/en/3d-model/gadget/cool-gadget
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cultstat_core::DEFAULT_CONFIG_FILE;

/// Cults3D creator statistics poller
#[derive(Debug, Parser)]
#[command(
    name = "cultstat",
    author,
    version,
    about = "Poll Cults3D creator statistics and publish them as named values"
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Answer every request from canned responses instead of the network.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Log filter (e.g. `debug`, `cultstat_core=trace`). Overrides `[log] level`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Identifier prefixed to every published value id.
    #[arg(long, global = true, default_value = "cultstat")]
    pub entry_id: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text for terminal display.
    Table,
    /// Single JSON object output.
    Json,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one refresh cycle and print the resulting values.
    Fetch,

    /// Refresh on the configured interval, printing each published status.
    ///
    ///   cultstat watch
    ///   cultstat watch --cycles 3
    Watch(WatchArgs),

    /// Validate the configured nickname and API key, or a replacement key.
    ///
    ///   cultstat validate
    ///   cultstat validate --api-key NEW_KEY --save
    Validate(ValidateArgs),

    /// Manage the tracked-creation list in the configuration file.
    Tracked(TrackedArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many completed cycles.
    #[arg(long)]
    pub cycles: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Check this key for the configured nickname instead of the stored one.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Write the accepted key back to the configuration file.
    #[arg(long, requires = "api_key", default_value_t = false)]
    pub save: bool,
}

#[derive(Debug, Args)]
pub struct TrackedArgs {
    #[command(subcommand)]
    pub command: TrackedCommand,
}

#[derive(Debug, Subcommand)]
pub enum TrackedCommand {
    /// List tracked creations.
    List,
    /// Track a creation by slug or URL.
    Add { identifier: String },
    /// Stop tracking a creation.
    Remove { identifier: String },
}
