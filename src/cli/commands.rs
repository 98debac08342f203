//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive the main loop against a capture source
//! - check-route: load and validate a route file
//! - check-definitions: generate every processor of a definition set

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Splitwatch - frame-driven autosplitter
#[derive(Parser, Debug)]
#[command(name = "splitwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the autosplitter over a directory of captured frames
    Run {
        /// Route file (YAML, or JSON by extension)
        route: PathBuf,

        /// Directory of PNG frames, replayed in name order
        #[arg(short, long)]
        frames: PathBuf,

        /// Recorded classifier output (frame index -> class, confidence)
        #[arg(short, long)]
        predictions: Option<PathBuf>,

        /// Log timer commands instead of sending them to LiveSplit
        #[arg(long)]
        dry_run: bool,

        /// Print every state change as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Load and validate a route file
    CheckRoute {
        /// Route file to check
        route: PathBuf,
    },

    /// Generate every processor of a definition set and report failures
    CheckDefinitions {
        /// Definition set (subdirectory of the definition root)
        #[arg(short, long, default_value = "standard")]
        logic: String,

        /// Also check that the set covers every checkpoint kind of this route
        #[arg(short, long)]
        route: Option<PathBuf>,
    },
}
