//! Command-line interface.

use clap::Parser;
use std::path::PathBuf;

/// Point-to-point file transfer with end-to-end integrity verification.
///
/// One peer listens, the other connects; both send the files they were
/// given, then receive whatever the peer offers. Directory structure and
/// the executable bit survive the trip.
#[derive(Debug, Parser)]
#[command(name = "ferry", version, about)]
pub struct Cli {
    /// Host address to connect to
    #[arg(long, value_name = "HOST")]
    pub connect: Option<String>,

    /// Listen for a connection instead of connecting
    #[arg(long)]
    pub listen: bool,

    /// Connection port
    #[arg(long, default_value_t = 3214)]
    pub port: u16,

    /// Directory for receiving files
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Files and directories to send
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,
}
