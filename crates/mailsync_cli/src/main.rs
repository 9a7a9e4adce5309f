//! Mailsync CLI
//!
//! Command-line tools for archive imports.
//!
//! # Commands
//!
//! - `run` - Import an archive dump into the export remote
//! - `resume` - Resume a checkpointed session
//! - `inspect` - Show checkpoint state for sessions

mod commands;
mod io;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Mailsync command-line import tools.
#[derive(Parser)]
#[command(name = "mailsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the state directory
    #[arg(global = true, short, long, default_value = ".mailsync")]
    state: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an archive dump
    Run {
        /// Archive dump to read (one JSON record per line)
        #[arg(short, long)]
        input: PathBuf,

        /// Export file standing in for the remote system
        #[arg(short, long)]
        output: PathBuf,

        /// Initial batch size
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Concurrent remote writes per batch
        #[arg(short, long)]
        workers: Option<usize>,

        /// Print the session summary as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Resume a checkpointed session
    Resume {
        /// Session id to resume
        session_id: Uuid,

        /// Archive dump the session was reading
        #[arg(short, long)]
        input: PathBuf,

        /// Export file standing in for the remote system
        #[arg(short, long)]
        output: PathBuf,

        /// Initial batch size
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Concurrent remote writes per batch
        #[arg(short, long)]
        workers: Option<usize>,

        /// Print the session summary as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show checkpoint state
    Inspect {
        /// Limit output to one session
        session_id: Option<Uuid>,

        /// Print checkpoints as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            input,
            output,
            batch_size,
            workers,
            json,
        } => {
            commands::run::run(&cli.state, &input, &output, batch_size, workers, json)?;
        }
        Commands::Resume {
            session_id,
            input,
            output,
            batch_size,
            workers,
            json,
        } => {
            commands::resume::run(
                &cli.state, session_id, &input, &output, batch_size, workers, json,
            )?;
        }
        Commands::Inspect { session_id, json } => {
            commands::inspect::run(&cli.state, session_id, json)?;
        }
        Commands::Version => {
            println!("Mailsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
