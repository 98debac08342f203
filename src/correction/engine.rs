//! Progress-counter correction
//!
//! Turns the noisy per-frame classifier stream into a monotonic progress
//! counter. One of two acceptance policies decides forward increments; the
//! undo and forward-skip passes run every frame in either mode.

use std::time::Duration;

use crate::route::ProgressMode;
use crate::run::RunContext;
use crate::state::Prediction;

/// Thresholds and sizes used by the correction passes
#[derive(Debug, Clone)]
pub struct CorrectionConfig {
    /// Lower confidence bar: a plausible reading
    pub detection: f64,
    /// Higher confidence bar: a strong reading
    pub confirmation: f64,
    /// Mean confidence of `progress - 1` readings that triggers a rollback
    pub undo: f64,
    pub min_undo_count: usize,
    /// Consecutive identical readings needed for a forward skip
    pub skip_min_samples: usize,
    /// How long after a camera event a confirmation-mode increment is accepted
    pub camera_window: Duration,
    /// Classes at or above this value are out-of-range sentinels
    pub sentinel_floor: u32,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            detection: 0.5,
            confirmation: 0.85,
            undo: 0.9,
            min_undo_count: 4,
            skip_min_samples: 5,
            camera_window: Duration::from_millis(2000),
            sentinel_floor: 121,
        }
    }
}

/// A change the correction engine committed this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Forward increment accepted
    Advanced(u32),
    /// Rolled back by one; `undo` is true if a timer undo was issued
    Regressed { to: u32, undo: bool },
    /// Jumped over missed increments
    Skipped { to: u32, undo: bool },
}

#[derive(Debug, Clone, Copy)]
struct Streak {
    class: u32,
    len: usize,
}

pub struct CorrectionEngine {
    config: CorrectionConfig,
    streak: Option<Streak>,
}

impl CorrectionEngine {
    pub fn new(config: CorrectionConfig) -> Self {
        Self { config, streak: None }
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Whether a sample is close enough to the counter to enter the window
    pub fn admits(&self, progress: u32, sample: &Prediction) -> bool {
        let low = progress.saturating_sub(1);
        (low..=progress + 1).contains(&sample.class) || sample.class >= self.config.sentinel_floor
    }

    /// Feed one classifier reading.
    ///
    /// Commits at most one change per frame.
    pub fn apply(&mut self, sample: Prediction, ctx: &mut RunContext<'_>) -> Option<Correction> {
        ctx.state.last_sample = Some(sample);
        self.track_streak(&sample);

        let progress = ctx.state.progress;
        if !self.admits(progress, &sample) {
            return self.forward_skip(ctx);
        }
        ctx.state.window.push(sample);

        let advanced = match ctx.route.mode {
            ProgressMode::Probability => self.probability_accepts(ctx),
            ProgressMode::Confirmation => self.confirmation_accepts(&sample, ctx),
        };
        if advanced {
            ctx.set_progress(progress + 1);
            self.streak = None;
            return Some(Correction::Advanced(progress + 1));
        }

        if let Some(correction) = self.regression(ctx) {
            return Some(correction);
        }
        self.forward_skip(ctx)
    }

    /// One strong and one plausible `progress + 1` reading in the last two samples.
    ///
    /// The two readings may arrive in either order.
    fn probability_accepts(&self, ctx: &RunContext<'_>) -> bool {
        let target = ctx.state.progress + 1;
        let last_two = ctx.state.window.last_two();
        let [a, b] = last_two.as_slice() else {
            return false;
        };
        if a.class != target || b.class != target {
            return false;
        }

        let (detection, confirmation) = (self.config.detection, self.config.confirmation);
        (a.confidence >= detection && b.confidence >= confirmation)
            || (b.confidence >= detection && a.confidence >= confirmation)
    }

    /// A single strong `progress + 1` reading shortly after a camera event
    fn confirmation_accepts(&self, sample: &Prediction, ctx: &RunContext<'_>) -> bool {
        if sample.class != ctx.state.progress + 1 || sample.confidence <= self.config.confirmation {
            return false;
        }
        ctx.state
            .last_camera_at
            .is_some_and(|at| ctx.now().saturating_duration_since(at) <= self.config.camera_window)
    }

    fn regression(&mut self, ctx: &mut RunContext<'_>) -> Option<Correction> {
        let previous = ctx.state.progress.checked_sub(1)?;
        let window = &ctx.state.window;
        if window.count(previous) < self.config.min_undo_count {
            return None;
        }
        let mean = window.mean_confidence(previous)?;
        if mean <= self.config.undo {
            return None;
        }

        log::info!("Progress regression: mean confidence {:.2} for {}", mean, previous);
        ctx.set_progress(previous);
        self.streak = None;
        let undo = undo_if_invalidated(ctx);
        Some(Correction::Regressed { to: previous, undo })
    }

    fn forward_skip(&mut self, ctx: &mut RunContext<'_>) -> Option<Correction> {
        if !ctx.route.forward_skip {
            return None;
        }
        let streak = self.streak?;
        if streak.len < self.config.skip_min_samples || streak.class <= ctx.state.progress {
            return None;
        }

        let floor = ctx.route.progress_floor(ctx.state.split_index);
        let ceiling = ctx.current_split().and_then(|s| s.progress)?;
        if !(floor..=ceiling).contains(&streak.class) {
            return None;
        }

        log::info!(
            "Forward skip: {} consecutive readings of {} (progress was {})",
            streak.len,
            streak.class,
            ctx.state.progress
        );
        ctx.set_progress(streak.class);
        self.streak = None;
        let undo = undo_if_invalidated(ctx);
        Some(Correction::Skipped { to: streak.class, undo })
    }

    fn track_streak(&mut self, sample: &Prediction) {
        if sample.confidence <= self.config.detection {
            self.streak = None;
            return;
        }
        self.streak = match self.streak {
            Some(Streak { class, len }) if class == sample.class => Some(Streak { class, len: len + 1 }),
            _ => Some(Streak {
                class: sample.class,
                len: 1,
            }),
        };
    }

    /// Forget the forward-skip streak
    pub fn reset(&mut self) {
        self.streak = None;
    }
}

/// Undo the previous checkpoint if it expected more progress than we now have
fn undo_if_invalidated(ctx: &mut RunContext<'_>) -> bool {
    let Some(expected) = ctx.previous_split().and_then(|s| s.progress) else {
        return false;
    };
    if ctx.state.progress < expected {
        ctx.undo();
        return true;
    }
    false
}
