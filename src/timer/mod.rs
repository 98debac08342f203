//! Timer client interface
//!
//! Commands are fire-and-forget; only the split index query has a response.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

mod livesplit;

pub use livesplit::{LiveSplitClient, LiveSplitConfig};

/// A command sent to the external timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerCommand {
    /// Start the timer, or split if it is running
    Split,
    Skip,
    Undo,
    Reset,
}

impl fmt::Display for TimerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerCommand::Split => "split",
            TimerCommand::Skip => "skip",
            TimerCommand::Undo => "undo",
            TimerCommand::Reset => "reset",
        };
        write!(f, "{}", name)
    }
}

/// Connection to a speedrun timer
pub trait TimerClient {
    /// Send a command without waiting for acknowledgement
    fn send(&mut self, command: TimerCommand) -> Result<()>;

    /// Ask the timer which checkpoint it is on
    fn query_index(&mut self) -> Result<usize>;
}

/// Timer that only logs what it would have sent.
///
/// Tracks the checkpoint index the way LiveSplit would: the first split
/// starts the timer, later ones advance it.
#[derive(Debug, Default)]
pub struct DryRunTimer {
    sent: usize,
    running: bool,
    index: usize,
}

impl DryRunTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands received
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl TimerClient for DryRunTimer {
    fn send(&mut self, command: TimerCommand) -> Result<()> {
        self.sent += 1;
        match command {
            TimerCommand::Split if !self.running => self.running = true,
            TimerCommand::Split | TimerCommand::Skip if self.running => self.index += 1,
            TimerCommand::Undo if self.running => self.index = self.index.saturating_sub(1),
            TimerCommand::Reset => {
                self.running = false;
                self.index = 0;
            }
            _ => {}
        }
        log::info!("[dry-run] timer command: {} (index {})", command, self.index);
        Ok(())
    }

    fn query_index(&mut self) -> Result<usize> {
        Ok(self.index)
    }
}
