//! Runtime settings.
//!
//! Loaded from ./splitwatch.yml or ~/.config/splitwatch/splitwatch.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::correction::CorrectionConfig;
use crate::perception::{CameraDetector, PerceptionConfig, Rect, Region, SamplePoint};
use crate::timer::LiveSplitConfig;

/// Settings for splitwatch.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Log level used when RUST_LOG is unset.
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    pub general: GeneralConfig,

    pub thresholds: ThresholdConfig,

    pub correction: CorrectionSettings,

    pub fade: FadeConfig,

    #[serde(rename = "frame-rates")]
    pub frame_rates: FrameRates,

    /// Pixel rectangles of the regions perception looks at.
    pub regions: RegionConfig,

    pub camera: CameraConfig,

    pub timer: TimerConfig,

    pub definitions: DefinitionsConfig,

    pub processes: ProcessTimings,
}

impl Settings {
    /// Load settings with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. splitwatch.yml in current directory
    /// 3. ~/.config/splitwatch/splitwatch.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from("splitwatch.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from splitwatch.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load splitwatch.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("splitwatch").join("splitwatch.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("black", t.black),
            ("black-proportion", t.black_proportion),
            ("white", t.white),
            ("white-proportion", t.white_proportion),
            ("detection", t.detection),
            ("confirmation", t.confirmation),
            ("undo", t.undo),
        ] {
            if !(0.0..=1.0).contains(&value) {
                eyre::bail!("thresholds.{} must be within 0..=1, got {}", name, value);
            }
        }
        if t.detection > t.confirmation {
            eyre::bail!("thresholds.detection must not exceed thresholds.confirmation");
        }
        if self.correction.window_len < 2 {
            eyre::bail!("correction.window-len must be >= 2");
        }
        if self.general.default_fps <= 0.0 {
            eyre::bail!("general.default-fps must be > 0");
        }
        Ok(())
    }

    pub fn split_cooldown(&self) -> Duration {
        Duration::from_millis(self.general.split_cooldown_ms)
    }

    pub fn perception(&self) -> PerceptionConfig {
        PerceptionConfig {
            black: self.thresholds.black,
            black_proportion: self.thresholds.black_proportion,
            white: self.thresholds.white,
            white_proportion: self.thresholds.white_proportion,
            reset_match: self.thresholds.reset_match,
            fade_min_dwell: Duration::from_millis(self.fade.min_dwell_ms),
        }
    }

    pub fn correction(&self) -> CorrectionConfig {
        CorrectionConfig {
            detection: self.thresholds.detection,
            confirmation: self.thresholds.confirmation,
            undo: self.thresholds.undo,
            min_undo_count: self.correction.min_undo_count,
            skip_min_samples: self.correction.skip_min_samples,
            camera_window: Duration::from_millis(self.correction.camera_window_ms),
            sentinel_floor: self.correction.sentinel_floor,
        }
    }

    pub fn camera_detector(&self) -> CameraDetector {
        CameraDetector::new(self.camera.points.clone(), self.camera.tolerance)
    }

    pub fn live_split(&self) -> LiveSplitConfig {
        LiveSplitConfig {
            host: self.timer.host.clone(),
            port: self.timer.port,
            query_timeout: Duration::from_millis(self.timer.query_timeout_ms),
        }
    }
}

/// General run behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Minimum time between two splits in milliseconds.
    #[serde(rename = "split-cooldown-ms")]
    pub split_cooldown_ms: u64,

    /// Race mode: console resets do not reset the timer.
    #[serde(rename = "srl-mode")]
    pub srl_mode: bool,

    /// Delay between a reset and the restart split in milliseconds.
    #[serde(rename = "restart-split-delay-ms")]
    pub restart_split_delay_ms: u64,

    /// Frame rate before any process requests one.
    #[serde(rename = "default-fps")]
    pub default_fps: f64,

    /// Images of the console reset screen.
    #[serde(rename = "reset-templates")]
    pub reset_templates: Vec<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            split_cooldown_ms: 3000,
            srl_mode: false,
            restart_split_delay_ms: 1000,
            default_fps: 10.0,
            reset_templates: Vec::new(),
        }
    }
}

/// Colour and confidence thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub black: f64,

    #[serde(rename = "black-proportion")]
    pub black_proportion: f64,

    pub white: f64,

    #[serde(rename = "white-proportion")]
    pub white_proportion: f64,

    pub detection: f64,

    pub confirmation: f64,

    pub undo: f64,

    #[serde(rename = "reset-match")]
    pub reset_match: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            black: 0.1,
            black_proportion: 0.9,
            white: 0.8,
            white_proportion: 0.99,
            detection: 0.5,
            confirmation: 0.85,
            undo: 0.9,
            reset_match: 0.02,
        }
    }
}

/// Correction window sizes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrectionSettings {
    #[serde(rename = "window-len")]
    pub window_len: usize,

    #[serde(rename = "min-undo-count")]
    pub min_undo_count: usize,

    #[serde(rename = "skip-min-samples")]
    pub skip_min_samples: usize,

    #[serde(rename = "camera-window-ms")]
    pub camera_window_ms: u64,

    /// Classes at or above this value are admitted as sentinels.
    #[serde(rename = "sentinel-floor")]
    pub sentinel_floor: u32,
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        Self {
            window_len: 8,
            min_undo_count: 4,
            skip_min_samples: 5,
            camera_window_ms: 2000,
            sentinel_floor: 121,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FadeConfig {
    #[serde(rename = "min-dwell-ms")]
    pub min_dwell_ms: u64,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self { min_dwell_ms: 100 }
    }
}

/// Frame rate each behavioural phase runs at.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrameRates {
    pub idle: f64,

    #[serde(rename = "run-start")]
    pub run_start: f64,

    pub progress: f64,

    #[serde(rename = "fade-out")]
    pub fade_out: f64,

    #[serde(rename = "fade-in")]
    pub fade_in: f64,

    #[serde(rename = "post-fade-out")]
    pub post_fade_out: f64,

    #[serde(rename = "flash-check")]
    pub flash_check: f64,

    pub camera: f64,
}

impl Default for FrameRates {
    fn default() -> Self {
        Self {
            idle: 10.0,
            run_start: 6.0,
            progress: 10.0,
            fade_out: 30.0,
            fade_in: 29.97,
            post_fade_out: 15.0,
            flash_check: 29.97,
            camera: 15.0,
        }
    }
}

/// Region rectangles, defaults for a 640x480 frame.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionConfig {
    pub rects: HashMap<Region, Rect>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            rects: HashMap::from([
                (Region::Progress, Rect::new(464, 32, 112, 32)),
                (Region::Life, Rect::new(224, 32, 112, 32)),
                (Region::FadeOut, Rect::new(0, 0, 640, 24)),
                (Region::FadeIn, Rect::new(288, 208, 64, 64)),
                (Region::Reset, Rect::new(200, 180, 240, 120)),
            ]),
        }
    }
}

/// Camera-event sample points.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraConfig {
    pub points: Vec<SamplePoint>,

    pub tolerance: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            tolerance: 25,
        }
    }
}

/// LiveSplit Server connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimerConfig {
    pub host: String,

    pub port: u16,

    #[serde(rename = "query-timeout-ms")]
    pub query_timeout_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 16834,
            query_timeout_ms: 500,
        }
    }
}

/// Processor definition files.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefinitionsConfig {
    /// Root directory holding one subdirectory per definition set.
    pub dir: PathBuf,

    /// Definition path substitutions, relative to `dir`.
    pub redirects: HashMap<PathBuf, PathBuf>,
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("definitions"),
            redirects: HashMap::new(),
        }
    }
}

/// Timing of the standard processes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessTimings {
    /// How long the post-fade-out observation lasts.
    #[serde(rename = "post-fade-out-secs")]
    pub post_fade_out_secs: f64,

    /// How long flash checking waits for alternations.
    #[serde(rename = "flash-window-secs")]
    pub flash_window_secs: f64,

    #[serde(rename = "flash-min-alternations")]
    pub flash_min_alternations: u32,

    /// Flashes are ignored this soon after a progress change.
    #[serde(rename = "flash-collection-guard-secs")]
    pub flash_collection_guard_secs: f64,
}

impl Default for ProcessTimings {
    fn default() -> Self {
        Self {
            post_fade_out_secs: 6.0,
            flash_window_secs: 2.0,
            flash_min_alternations: 4,
            flash_collection_guard_secs: 15.0,
        }
    }
}
