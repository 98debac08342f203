//! Driving a run: the per-tick context processes see and the main loop

mod assemble;
pub(crate) mod context;
mod runner;

pub use assemble::assemble_switch;
pub use context::RunContext;
pub use runner::{LogListener, RunListener, RunStats, Runner, StopReason, TickResult};
