//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Upload a manifest of named links into topic threads and index them.
///
/// Every line of the manifest that carries an http(s) URL becomes one item.
/// A `(Topic)` in the name files the item under that topic.
#[derive(Parser, Debug)]
#[command(name = "uploader")]
#[command(author, version, about)]
pub struct Args {
    /// Manifest file; its name is the default batch name
    pub manifest: PathBuf,

    /// Id of the chat the run is started from (default destination)
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub chat: i64,

    /// Root directory of the local destination mirror
    #[arg(long)]
    pub destination_root: Option<PathBuf>,

    /// Directory for the database, snapshots and downloads
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Seconds to wait for each parameter reply (1-600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub prompt_timeout: Option<u64>,

    /// Do not ask for parameters; use every default
    #[arg(long)]
    pub non_interactive: bool,

    /// Configuration file (default: $XDG_CONFIG_HOME/uploader/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
