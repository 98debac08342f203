//! CLI module for splitwatch - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the
//! autosplitter and checking routes and definition sets.

pub mod commands;

pub use commands::Cli;
