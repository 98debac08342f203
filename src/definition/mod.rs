//! Processor definitions
//!
//! A definition file names an initial process, an optional parent to
//! inherit transitions from, a transition table and nested sub-processors.
//! `ProcessorGenerator` turns one into a fully resolved `Processor`.

mod error;
mod file;
mod generator;

pub use error::{LoadError, UnresolvedReference};
pub use file::{DefinitionFile, GLOBAL_SOURCE, TransitionTable, merge_transitions};
pub use generator::ProcessorGenerator;
