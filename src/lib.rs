//! Splitwatch - a frame-driven autosplitter
//!
//! Splitwatch watches a game's rendered frames, turns noisy per-frame
//! classifications into reliable progress events and drives an external
//! speedrun timer. Behaviour is sequenced by hierarchical state machines
//! (processors) generated from declarative definition files.

pub mod config;
pub mod correction;
pub mod definition;
pub mod engine;
pub mod error;
pub mod perception;
pub mod processes;
pub mod route;
pub mod run;
pub mod state;
pub mod timer;

pub use error::{Result, SplitError};
pub use route::{Route, Split, load_route};
pub use run::{Runner, assemble_switch};
pub use state::{FadeStatus, GameState, Prediction, StateSnapshot};
