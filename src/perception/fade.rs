//! Fade state machine
//!
//! ```text
//! NO_FADE ──primary black──▶ FADE_OUT_PARTIAL ──secondary black ≥ dwell──▶ FADE_OUT_COMPLETE
//! NO_FADE ──primary white──▶ FADE_IN_PARTIAL  ──fade-in region clear ≥ dwell──▶ FADE_IN_COMPLETE
//! any fade ──primary no longer matches──▶ NO_FADE
//! ```
//!
//! Counters move only on the `NO_FADE → *_PARTIAL` edge.

use std::time::{Duration, Instant};

use crate::state::{FadeStatus, GameState};

/// Region predicates evaluated for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FadeFrame {
    /// Progress and life regions are both black
    pub out_primary: bool,
    /// Fade-out region is black
    pub out_secondary: bool,
    /// Progress and life regions are both white
    pub in_primary: bool,
    /// Fade-in region is no longer white
    pub in_secondary: bool,
}

impl FadeFrame {
    pub fn black(secondary: bool) -> Self {
        Self {
            out_primary: true,
            out_secondary: secondary,
            ..Self::default()
        }
    }

    pub fn white(secondary: bool) -> Self {
        Self {
            in_primary: true,
            in_secondary: secondary,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct FadeDetector {
    min_dwell: Duration,
    secondary_since: Option<Instant>,
}

impl FadeDetector {
    pub fn new(min_dwell: Duration) -> Self {
        Self {
            min_dwell,
            secondary_since: None,
        }
    }

    /// Advance the state machine by one frame and publish the result into `state`
    pub fn update(&mut self, frame: FadeFrame, state: &mut GameState, now: Instant) -> FadeStatus {
        let current = state.fade_status;
        let secondary = match current {
            FadeStatus::FadeOutPartial | FadeStatus::FadeOutComplete => frame.out_secondary,
            FadeStatus::FadeInPartial | FadeStatus::FadeInComplete => frame.in_secondary,
            FadeStatus::NoFade => false,
        };
        if secondary {
            self.secondary_since.get_or_insert(now);
        } else {
            self.secondary_since = None;
        }
        let dwelled = self
            .secondary_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.min_dwell);

        let next = match current {
            FadeStatus::NoFade if frame.out_primary => {
                self.on_fade_out(state, now);
                FadeStatus::FadeOutPartial
            }
            FadeStatus::NoFade if frame.in_primary => {
                self.on_fade_in(state, now);
                FadeStatus::FadeInPartial
            }
            FadeStatus::NoFade => FadeStatus::NoFade,
            FadeStatus::FadeOutPartial | FadeStatus::FadeOutComplete if !frame.out_primary => FadeStatus::NoFade,
            FadeStatus::FadeOutPartial if dwelled => FadeStatus::FadeOutComplete,
            FadeStatus::FadeInPartial | FadeStatus::FadeInComplete if !frame.in_primary => FadeStatus::NoFade,
            FadeStatus::FadeInPartial if dwelled => FadeStatus::FadeInComplete,
            other => other,
        };

        if next != current {
            log::debug!("Fade status: {} -> {}", current, next);
            if next == FadeStatus::NoFade {
                self.secondary_since = None;
            }
        }
        state.fade_status = next;
        next
    }

    fn on_fade_out(&self, state: &mut GameState, now: Instant) {
        if state.counting_enabled {
            state.fade_out_count += 1;
            log::debug!("Fade-out #{}", state.fade_out_count);
        }
        state.camera_count = 0;
        state.last_fade_out_at = Some(now);
    }

    fn on_fade_in(&self, state: &mut GameState, now: Instant) {
        if state.counting_enabled {
            state.fade_in_count += 1;
            log::debug!("Fade-in #{}", state.fade_in_count);
        }
        state.camera_count = 0;
        state.last_fade_in_at = Some(now);
    }
}
