//! Route and split model
//!
//! A route is the ordered list of checkpoints a run passes through. Each
//! checkpoint names the processor kind that detects it and the counters that
//! must match before the timer is split.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};
use crate::state::GameState;

mod loader;

pub use loader::{load_route, save_route};

/// Default label of the definition set a route runs with
pub const DEFAULT_LOGIC: &str = "standard";

/// Default upper bound of the progress counter
pub const DEFAULT_MAX_PROGRESS: u32 = 120;

/// Policy for accepting a forward progress increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// One strong and one plausible reading within the last two samples
    #[default]
    Probability,
    /// A single strong reading shortly after a camera event
    Confirmation,
}

/// One checkpoint of a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Split {
    pub title: String,

    /// Progress value at which this checkpoint completes (None: not gated on progress)
    #[serde(default)]
    pub progress: Option<u32>,

    /// Fade-outs required after reaching the progress value
    #[serde(default)]
    pub fade_out: Option<u32>,

    /// Fade-ins required after reaching the progress value
    #[serde(default)]
    pub fade_in: Option<u32>,

    /// Camera events required
    #[serde(default)]
    pub camera: Option<u32>,

    /// Checkpoint kind, selects the processor that runs while this split is current
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<PathBuf>,
}

impl Split {
    pub fn new(title: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            progress: None,
            fade_out: None,
            fade_in: None,
            camera: None,
            kind: kind.into(),
            icon: None,
        }
    }

    pub fn with_progress(mut self, progress: u32) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_fade_out(mut self, count: u32) -> Self {
        self.fade_out = Some(count);
        self
    }

    pub fn with_fade_in(mut self, count: u32) -> Self {
        self.fade_in = Some(count);
        self
    }

    pub fn with_camera(mut self, count: u32) -> Self {
        self.camera = Some(count);
        self
    }

    /// Whether every gated counter matches the game state
    pub fn is_incoming(&self, state: &GameState) -> bool {
        let matches = |expected: Option<u32>, actual: u32| expected.is_none_or(|e| e == actual);

        matches(self.progress, state.progress)
            && matches(self.fade_out, state.fade_out_count)
            && matches(self.fade_in, state.fade_in_count)
            && matches(self.camera, state.camera_count)
    }

    fn has_condition(&self) -> bool {
        self.progress.is_some() || self.fade_out.is_some() || self.fade_in.is_some() || self.camera.is_some()
    }
}

/// An ordered run of checkpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Route {
    pub title: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub initial_progress: u32,

    /// Definition set used to build this route's processors
    #[serde(default = "default_logic")]
    pub logic: String,

    /// Game version label shown to the user
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub mode: ProgressMode,

    /// Allow jumping the progress counter over missed increments
    #[serde(default)]
    pub forward_skip: bool,

    #[serde(default = "default_max_progress")]
    pub max_progress: u32,

    /// Definition path substitutions for this route
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub redirects: HashMap<PathBuf, PathBuf>,

    pub splits: Vec<Split>,
}

fn default_logic() -> String {
    DEFAULT_LOGIC.to_string()
}

fn default_max_progress() -> u32 {
    DEFAULT_MAX_PROGRESS
}

impl Route {
    pub fn new(title: impl Into<String>, splits: Vec<Split>) -> Self {
        Self {
            title: title.into(),
            category: String::new(),
            initial_progress: 0,
            logic: default_logic(),
            version: String::new(),
            mode: ProgressMode::default(),
            forward_skip: false,
            max_progress: DEFAULT_MAX_PROGRESS,
            redirects: HashMap::new(),
            splits,
        }
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    pub fn split(&self, index: usize) -> Option<&Split> {
        self.splits.get(index)
    }

    /// Progress value expected by the checkpoint before `index`, if it is gated
    pub fn previous_progress(&self, index: usize) -> Option<u32> {
        index.checked_sub(1).and_then(|i| self.splits.get(i)).and_then(|s| s.progress)
    }

    /// Progress value the run stood at when checkpoint `index` became current
    pub fn progress_floor(&self, index: usize) -> u32 {
        self.previous_progress(index).unwrap_or(self.initial_progress)
    }

    /// Every distinct checkpoint kind in order of first appearance
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = Vec::new();
        for split in &self.splits {
            if !kinds.contains(&split.kind.as_str()) {
                kinds.push(&split.kind);
            }
        }
        kinds
    }

    /// Check the route for consistency.
    ///
    /// Progress values must be non-decreasing across gated checkpoints.
    pub fn validate(&self) -> Result<()> {
        if self.splits.is_empty() {
            return Err(SplitError::Route("Route must contain at least one split".to_string()));
        }

        if self.initial_progress > self.max_progress {
            return Err(SplitError::Route(format!(
                "Initial progress {} exceeds maximum {}",
                self.initial_progress, self.max_progress
            )));
        }

        let mut previous: Option<u32> = None;
        for split in &self.splits {
            if split.kind.trim().is_empty() {
                return Err(SplitError::Route(format!("Split '{}' has no kind", split.title)));
            }

            if !split.has_condition() {
                return Err(SplitError::Route(format!(
                    "Split '{}' has no progress, fade or camera condition",
                    split.title
                )));
            }

            if split.fade_out == Some(0) && split.fade_in == Some(0) && split.camera.is_none() {
                return Err(SplitError::Route(format!(
                    "Split '{}' requires zero fade-outs and zero fade-ins",
                    split.title
                )));
            }

            if let Some(progress) = split.progress {
                if progress > self.max_progress {
                    return Err(SplitError::Route(format!(
                        "Split '{}' progress {} exceeds maximum {}",
                        split.title, progress, self.max_progress
                    )));
                }
                if progress < self.initial_progress {
                    return Err(SplitError::Route(format!(
                        "Split '{}' progress {} is below initial progress {}",
                        split.title, progress, self.initial_progress
                    )));
                }
                if let Some(prev) = previous
                    && progress < prev
                {
                    return Err(SplitError::Route(format!(
                        "Split '{}' progress {} is lower than previous split {}",
                        split.title, progress, prev
                    )));
                }
                previous = Some(progress);
            }
        }

        Ok(())
    }
}
