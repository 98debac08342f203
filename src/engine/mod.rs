//! Process-execution engine
//!
//! Hierarchical state machine: processes are leaves, processors are
//! composites with a transition table, and the switch picks the processor
//! for the current checkpoint kind.

mod process;
pub(crate) mod processor;
mod registry;
mod signal;
mod switch;

pub use process::{Process, ProcessClock, ProcessCore, ProcessRef, activate, shared};
pub use processor::Processor;
pub use registry::ProcessRegistry;
pub use signal::{LOOP_SIGNAL, SHARED_SCOPE, SignalId, SignalRegistry, SignalScope, split_qualified};
pub use switch::ProcessorSwitch;
