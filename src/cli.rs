use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clipforge")]
#[command(author, version, about = "Social media clip service: proxy, GIF/MP3 conversion and zip bundling")]
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
    /// Start the HTTP server and web UI
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Convert a remote video to a GIF (or MP3) without starting the server
    Clip {
        /// Video URL to download
        #[arg(required = true)]
        url: String,

        /// Start offset in seconds
        #[arg(long)]
        start: Option<String>,

        /// Clip length in seconds
        #[arg(long)]
        duration: Option<String>,

        /// Quality profile: balanced, high or retro
        #[arg(short, long)]
        quality: Option<String>,

        /// Extract the audio track as MP3 instead
        #[arg(long)]
        audio: bool,

        /// Output file (defaults to the download name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
