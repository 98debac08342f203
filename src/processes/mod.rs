//! Standard process catalogue
//!
//! Every process here is a singleton registered under its `NAME`. Definition
//! files refer to them by that name and to their signals as `name.SIGNAL`.
//! Processes that react to a fade-out raise the shared `shared.FADE_OUT`
//! signal so one global transition can route all of them to `fade_out`.

mod camera;
mod fade;
mod progress;
mod run;

use std::time::Duration;

pub use camera::CameraSplit;
pub use fade::{FadeIn, FadeOut};
pub use progress::{FlashCheck, FlashTiming, PostFadeOut, Progress};
pub use run::{Reset, RunStart, Wait};

use crate::config::Settings;
use crate::engine::{ProcessRegistry, SignalRegistry, shared};

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

impl FlashTiming {
    pub fn from_settings(settings: &Settings) -> Self {
        let p = &settings.processes;
        Self {
            observe: secs(p.post_fade_out_secs),
            window: secs(p.flash_window_secs),
            min_alternations: p.flash_min_alternations,
            collection_guard: secs(p.flash_collection_guard_secs),
            sentinel_floor: settings.correction.sentinel_floor,
        }
    }
}

/// Build every standard process from the settings
pub fn standard_registry(signals: &mut SignalRegistry, settings: &Settings) -> ProcessRegistry {
    let rates = &settings.frame_rates;
    let timing = FlashTiming::from_settings(settings);
    let restart_delay = Duration::from_millis(settings.general.restart_split_delay_ms);

    let mut registry = ProcessRegistry::new();
    registry.register(shared(Wait::new(signals, rates.idle)));
    registry.register(shared(RunStart::new(signals, rates.run_start, settings.thresholds.detection)));
    registry.register(shared(Progress::new(signals, rates.progress)));
    registry.register(shared(FadeOut::new(signals, rates.fade_out)));
    registry.register(shared(FadeIn::new(signals, rates.fade_in)));
    registry.register(shared(PostFadeOut::new(signals, rates.post_fade_out, timing.clone())));
    registry.register(shared(FlashCheck::new(signals, rates.flash_check, timing)));
    registry.register(shared(Reset::new(signals, settings.general.srl_mode, restart_delay)));
    registry.register(shared(CameraSplit::new(signals, rates.camera)));

    log::debug!("Standard registry: {}", registry.names().join(", "));
    registry
}
