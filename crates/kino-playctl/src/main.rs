//! Kino Playctl - Headless driver for the playback engine
//!
//! Features:
//! - Source configuration validation
//! - Quality ladder discovery from HLS master playlists
//! - Scripted playback sessions against the simulated backend

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Kino Playctl - Playback engine toolkit
#[derive(Parser)]
#[command(name = "kino-playctl")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Validate, inspect and simulate Kino playback sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a source configuration and show the selected controller
    Validate {
        /// Path to a JSON source configuration, or a media URL
        config: String,
    },

    /// Show the quality ladder of an HLS master playlist
    Qualities {
        /// Path to the master playlist
        playlist: PathBuf,
    },

    /// Drive a scripted session against the simulated backend
    Simulate {
        /// Path to a JSON source configuration, or a media URL
        config: String,

        /// Master playlist used as the stream's rendition list
        #[arg(short, long)]
        playlist: Option<PathBuf>,

        /// Inject a fatal engine fault (network, media, mux, key-system)
        #[arg(long)]
        fault: Option<String>,

        /// Let the element play HLS natively instead of through the engine
        #[arg(long)]
        native_hls: bool,

        /// Simulated media duration in seconds
        #[arg(short, long, default_value = "120")]
        duration: f64,

        /// Escalate to reinitialization after this many unrecovered faults
        #[arg(long)]
        escalate_after: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so event output stays parseable
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    kino_playback::init();

    match cli.command {
        Commands::Validate { config } => {
            commands::validate(&config, &cli.format)?;
        }
        Commands::Qualities { playlist } => {
            commands::qualities(&playlist, &cli.format)?;
        }
        Commands::Simulate {
            config,
            playlist,
            fault,
            native_hls,
            duration,
            escalate_after,
        } => {
            let options = commands::SimulateOptions {
                playlist,
                fault,
                native_hls,
                duration,
                escalate_after,
            };
            commands::simulate(&config, options, &cli.format).await?;
        }
    }

    Ok(())
}
