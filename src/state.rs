//! Shared game state
//!
//! `GameState` is written only by the main loop thread. Processes receive it
//! mutably for the duration of one `execute()` call through the run context;
//! observers only ever see a `StateSnapshot` copy.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::correction::PredictionWindow;

/// Fade state of the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FadeStatus {
    /// No fade in progress
    #[default]
    NoFade,
    /// Primary region went black, screen still fading
    FadeOutPartial,
    /// Secondary region black as well, screen fully faded out
    FadeOutComplete,
    /// Primary region went white
    FadeInPartial,
    /// Fade-in region cleared, screen fully faded in
    FadeInComplete,
}

impl FadeStatus {
    /// Partial or complete fade-out
    pub fn is_fade_out(&self) -> bool {
        matches!(self, FadeStatus::FadeOutPartial | FadeStatus::FadeOutComplete)
    }

    /// Partial or complete fade-in
    pub fn is_fade_in(&self) -> bool {
        matches!(self, FadeStatus::FadeInPartial | FadeStatus::FadeInComplete)
    }
}

impl fmt::Display for FadeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FadeStatus::NoFade => "NO_FADE",
            FadeStatus::FadeOutPartial => "FADE_OUT_PARTIAL",
            FadeStatus::FadeOutComplete => "FADE_OUT_COMPLETE",
            FadeStatus::FadeInPartial => "FADE_IN_PARTIAL",
            FadeStatus::FadeInComplete => "FADE_IN_COMPLETE",
        };
        write!(f, "{}", name)
    }
}

/// One classifier reading: top class and its confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: u32,
    pub confidence: f64,
}

impl Prediction {
    pub fn new(class: u32, confidence: f64) -> Self {
        Self { class, confidence }
    }
}

/// Mutable state of the run in progress
#[derive(Debug, Clone)]
pub struct GameState {
    /// Corrected progress counter
    pub progress: u32,
    pub fade_status: FadeStatus,
    pub fade_out_count: u32,
    pub fade_in_count: u32,
    pub camera_count: u32,
    /// Whether the current frame shows the alternate camera view
    pub in_camera: bool,
    /// Whether the reset region matches a reset template this frame
    pub reset_detected: bool,
    /// Most recent classifier reading, if the model produced one this frame
    pub last_sample: Option<Prediction>,
    /// Recent admitted classifier readings
    pub window: PredictionWindow,
    /// Locally tracked checkpoint index
    pub split_index: usize,
    /// Whether the timer has been started by a split since the last reset
    pub timer_running: bool,
    /// Whether the progress classifier runs this frame
    pub predictions_enabled: bool,
    /// Whether fade and camera edges increment their counters
    pub counting_enabled: bool,
    /// Frame rate requested by the active process
    pub target_fps: f64,
    pub last_split_at: Option<Instant>,
    pub last_fade_out_at: Option<Instant>,
    pub last_fade_in_at: Option<Instant>,
    pub last_reset_at: Option<Instant>,
    pub last_camera_at: Option<Instant>,
    /// When the progress counter last changed
    pub progress_changed_at: Option<Instant>,
}

impl GameState {
    /// Create the state for a fresh run
    pub fn new(initial_progress: u32, window_len: usize, fps: f64) -> Self {
        Self {
            progress: initial_progress,
            fade_status: FadeStatus::NoFade,
            fade_out_count: 0,
            fade_in_count: 0,
            camera_count: 0,
            in_camera: false,
            reset_detected: false,
            last_sample: None,
            window: PredictionWindow::new(window_len),
            split_index: 0,
            timer_running: false,
            predictions_enabled: true,
            counting_enabled: false,
            target_fps: fps,
            last_split_at: None,
            last_fade_out_at: None,
            last_fade_in_at: None,
            last_reset_at: None,
            last_camera_at: None,
            progress_changed_at: None,
        }
    }

    /// Commit a new progress value.
    ///
    /// Counters restart from zero and the window is cleared so samples taken
    /// against the old value cannot vote on the new one.
    pub fn set_progress(&mut self, progress: u32, now: Instant) {
        self.progress = progress;
        self.reset_counters();
        self.window.clear();
        self.progress_changed_at = Some(now);
    }

    /// Enable or disable fade/camera counting; both directions restart the counters
    pub fn enable_counting(&mut self, enable: bool) {
        self.counting_enabled = enable;
        self.reset_counters();
    }

    pub fn reset_counters(&mut self) {
        self.fade_out_count = 0;
        self.fade_in_count = 0;
        self.camera_count = 0;
    }

    /// Copy the observable part of the state
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            progress: self.progress,
            split_index: self.split_index,
            fade_status: self.fade_status,
            fade_out_count: self.fade_out_count,
            fade_in_count: self.fade_in_count,
            camera_count: self.camera_count,
            last_sample: self.last_sample,
            target_fps: self.target_fps,
            captured_at: Utc::now(),
        }
    }
}

/// Point-in-time copy of `GameState` for listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub progress: u32,
    pub split_index: usize,
    pub fade_status: FadeStatus,
    pub fade_out_count: u32,
    pub fade_in_count: u32,
    pub camera_count: u32,
    pub last_sample: Option<Prediction>,
    pub target_fps: f64,
    pub captured_at: DateTime<Utc>,
}

impl StateSnapshot {
    /// Whether two snapshots differ in anything a listener displays
    pub fn differs_from(&self, other: &StateSnapshot) -> bool {
        self.progress != other.progress
            || self.split_index != other.split_index
            || self.fade_status != other.fade_status
    }
}
