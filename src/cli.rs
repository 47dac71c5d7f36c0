// Author: Mode Control Entity contributors
// License: MIT

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mced",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mode Control Entity display daemon"
)]
pub struct Args {
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(short, long, action)]
    pub verbose: bool,

    #[arg(long, action)]
    pub no_console: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(about = "Print the current display status")]
    Status,

    #[command(about = "Request the display turn on")]
    On,

    #[command(about = "Request the display dim")]
    Dim,

    #[command(about = "Request the display turn off")]
    Off,

    #[command(about = "Request a CABC mode by name")]
    Cabc { mode: String },

    #[command(about = "Pause automatic blanking")]
    PauseBlanking,

    #[command(about = "Cancel a previously requested blanking pause")]
    ResumeBlanking,

    #[command(about = "Reload the configuration without restarting mced")]
    Reload,

    #[command(about = "Stop the running mced daemon")]
    Stop,

    #[command(about = "Display current state as machine- or human-readable text")]
    Info {
        #[arg(long)]
        json: bool,
    },
}
