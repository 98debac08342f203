//! Progress tracking processes

use std::time::Duration;

use crate::engine::{Process, ProcessCore, SignalId, SignalRegistry};
use crate::run::RunContext;

/// Flash sentinel classes emitted by the classifier
fn is_flash_class(class: u32, sentinel_floor: u32) -> bool {
    class == sentinel_floor || class == sentinel_floor + 1
}

/// Track progress with the classifier running until a fade starts
pub struct Progress {
    core: ProcessCore,
    fade_out: SignalId,
    fade_in: SignalId,
    fps: f64,
}

impl Progress {
    pub const NAME: &'static str = "progress";

    pub fn new(signals: &mut SignalRegistry, fps: f64) -> Self {
        let mut core = ProcessCore::new(signals, Self::NAME);
        let fade_in = core.register(signals, "FADEIN");
        let fade_out = signals.shared("FADE_OUT");
        Self {
            core,
            fade_out,
            fade_in,
            fps,
        }
    }
}

impl Process for Progress {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessCore {
        &mut self.core
    }

    fn execute(&mut self, ctx: &mut RunContext<'_>) -> SignalId {
        let status = ctx.state.fade_status;
        if status.is_fade_out() {
            return self.fade_out;
        }
        if status.is_fade_in() {
            return self.fade_in;
        }
        self.core.loop_signal()
    }

    fn on_transition(&mut self, ctx: &mut RunContext<'_>) {
        ctx.set_fps(self.fps);
        ctx.enable_predictions(true);
    }
}

/// Timing for the post-fade-out and flash processes
#[derive(Debug, Clone)]
pub struct FlashTiming {
    /// Post-fade-out observation length
    pub observe: Duration,
    /// Flash checking window
    pub window: Duration,
    pub min_alternations: u32,
    /// Flashes right after a progress change belong to that change
    pub collection_guard: Duration,
    pub sentinel_floor: u32,
}

impl Default for FlashTiming {
    fn default() -> Self {
        Self {
            observe: Duration::from_secs(6),
            window: Duration::from_secs(2),
            min_alternations: 4,
            collection_guard: Duration::from_secs(15),
            sentinel_floor: 121,
        }
    }
}

/// Observe the screen for a short while after a fade-out
pub struct PostFadeOut {
    core: ProcessCore,
    fade_out: SignalId,
    fade_in: SignalId,
    flash: SignalId,
    complete: SignalId,
    fps: f64,
    timing: FlashTiming,
}

impl PostFadeOut {
    pub const NAME: &'static str = "post_fade_out";

    /// Flash sentinels are ignored during the first second
    const FLASH_SETTLE: Duration = Duration::from_secs(1);

    pub fn new(signals: &mut SignalRegistry, fps: f64, timing: FlashTiming) -> Self {
        let mut core = ProcessCore::new(signals, Self::NAME);
        let fade_in = core.register(signals, "FADEIN");
        let flash = core.register(signals, "FLASH");
        let complete = core.register(signals, "COMPLETE");
        let fade_out = signals.shared("FADE_OUT");
        Self {
            core,
            fade_out,
            fade_in,
            flash,
            complete,
            fps,
            timing,
        }
    }
}

impl Process for PostFadeOut {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessCore {
        &mut self.core
    }

    fn execute(&mut self, ctx: &mut RunContext<'_>) -> SignalId {
        let status = ctx.state.fade_status;
        if status.is_fade_out() {
            return self.fade_out;
        }
        if status.is_fade_in() {
            return self.fade_in;
        }

        let elapsed = self.loop_time(ctx.now());
        let flashing = ctx
            .state
            .last_sample
            .is_some_and(|s| is_flash_class(s.class, self.timing.sentinel_floor));
        if flashing && elapsed > Self::FLASH_SETTLE {
            return self.flash;
        }

        if elapsed < self.timing.observe {
            self.core.loop_signal()
        } else {
            self.complete
        }
    }

    fn on_transition(&mut self, ctx: &mut RunContext<'_>) {
        ctx.enable_predictions(true);
        ctx.set_fps(self.fps);
    }
}

/// Count alternating flash readings; enough alternations mean a progress
/// increment the classifier missed.
pub struct FlashCheck {
    core: ProcessCore,
    fade_out: SignalId,
    fade_in: SignalId,
    complete: SignalId,
    fps: f64,
    timing: FlashTiming,
    running_total: i32,
    previous: i32,
    alternations: u32,
}

impl FlashCheck {
    pub const NAME: &'static str = "flash_check";

    /// Bound on the flash/non-flash imbalance for a genuine flash pattern
    const MAX_IMBALANCE: i32 = 10;

    pub fn new(signals: &mut SignalRegistry, fps: f64, timing: FlashTiming) -> Self {
        let mut core = ProcessCore::new(signals, Self::NAME);
        let fade_in = core.register(signals, "FADEIN");
        let complete = core.register(signals, "COMPLETE");
        let fade_out = signals.shared("FADE_OUT");
        Self {
            core,
            fade_out,
            fade_in,
            complete,
            fps,
            timing,
            running_total: 0,
            previous: 0,
            alternations: 0,
        }
    }

    fn credit_flash(&self, ctx: &mut RunContext<'_>) {
        let guard_passed = ctx
            .state
            .progress_changed_at
            .is_none_or(|at| ctx.now().saturating_duration_since(at) > self.timing.collection_guard);
        if !guard_passed {
            log::debug!("Flash ignored: progress changed recently");
            return;
        }

        let progress = ctx.state.progress + 1;
        log::info!("Flash pattern detected, progress -> {}", progress);
        ctx.set_progress(progress);

        let Some(split) = ctx.current_split() else {
            return;
        };
        if split.progress == Some(progress) {
            if split.fade_out == Some(1) {
                ctx.skip();
            } else {
                ctx.state.fade_out_count += 1;
            }
        }
    }
}

impl Process for FlashCheck {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessCore {
        &mut self.core
    }

    fn execute(&mut self, ctx: &mut RunContext<'_>) -> SignalId {
        let status = ctx.state.fade_status;
        if status.is_fade_out() {
            return self.fade_out;
        }
        if status.is_fade_in() {
            return self.fade_in;
        }

        let flashing = ctx
            .state
            .last_sample
            .is_some_and(|s| is_flash_class(s.class, self.timing.sentinel_floor));
        let normalized = if flashing { 1 } else { -1 };

        if normalized == -self.previous {
            self.alternations += 1;
        }
        self.running_total += normalized;
        self.previous = normalized;

        if self.running_total.abs() < Self::MAX_IMBALANCE && self.alternations >= self.timing.min_alternations {
            self.credit_flash(ctx);
            return self.complete;
        }

        if self.loop_time(ctx.now()) < self.timing.window {
            self.core.loop_signal()
        } else {
            self.complete
        }
    }

    fn on_transition(&mut self, ctx: &mut RunContext<'_>) {
        ctx.set_fps(self.fps);
        ctx.enable_predictions(true);
        self.running_total = 0;
        self.previous = 0;
        self.alternations = 0;
    }
}
