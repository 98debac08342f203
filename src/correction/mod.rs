//! Correction engine: classifier readings in, monotonic progress counter out

mod engine;
mod window;

pub use engine::{Correction, CorrectionConfig, CorrectionEngine};
pub use window::PredictionWindow;
