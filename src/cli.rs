use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "circlecast")]
#[command(author, version, about = "Telegram bot that turns short videos into round video notes")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the bot (reads the token from TELEGRAM_TOKEN)
    Start,

    /// Convert a single local file into a video note
    Convert {
        /// Video file to convert
        #[arg(required = true)]
        input: PathBuf,

        /// Where to write the result (default: <input stem>.note.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (falls back to --config, then defaults)
        path: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
