//! Fade handling processes

use crate::engine::{Process, ProcessCore, SignalId, SignalRegistry};
use crate::run::RunContext;
use crate::state::FadeStatus;

/// Split on a matching fade-out; detect console resets.
///
/// Holds the switch while the fade is in progress, so a split made here
/// does not hand the run to the next checkpoint's processor before a reset
/// can still take it back.
pub struct FadeOut {
    core: ProcessCore,
    reset: SignalId,
    complete: SignalId,
    fps: f64,
    split_occurred: bool,
    in_fade: bool,
}

impl FadeOut {
    pub const NAME: &'static str = "fade_out";

    pub fn new(signals: &mut SignalRegistry, fps: f64) -> Self {
        let mut core = ProcessCore::new(signals, Self::NAME);
        let reset = core.register(signals, "RESET");
        let complete = core.register(signals, "COMPLETE");
        Self {
            core,
            reset,
            complete,
            fps,
            split_occurred: false,
            in_fade: false,
        }
    }
}

impl Process for FadeOut {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessCore {
        &mut self.core
    }

    fn execute(&mut self, ctx: &mut RunContext<'_>) -> SignalId {
        if ctx.state.fade_status == FadeStatus::FadeOutComplete && ctx.incoming_split() && ctx.split() {
            self.split_occurred = true;
        }

        if ctx.state.reset_detected {
            // The fade-out was a console reset, not a checkpoint
            if self.split_occurred {
                ctx.undo();
            }
            ctx.enable_predictions(true);
            self.in_fade = false;
            return self.reset;
        }

        if ctx.state.fade_status.is_fade_out() {
            return self.core.loop_signal();
        }
        ctx.enable_predictions(true);
        self.in_fade = false;
        self.complete
    }

    fn on_transition(&mut self, ctx: &mut RunContext<'_>) {
        ctx.set_fps(self.fps);
        ctx.enable_predictions(false);
        self.split_occurred = false;
        self.in_fade = true;
    }

    fn relinquish(&self) -> bool {
        !self.in_fade
    }
}

/// Split on a matching completed fade-in.
///
/// Known defect: leaving on any status other than FADE_IN_PARTIAL means a
/// frame that is still FADE_IN_COMPLETE sends the run back to progress
/// tracking, which reports FADEIN again and re-enters this process. The
/// state oscillates until the fade-in region stops matching. Splits inside
/// the oscillation are absorbed by the split cooldown.
///
/// Like `FadeOut`, it holds the switch until it leaves.
pub struct FadeIn {
    core: ProcessCore,
    complete: SignalId,
    fps: f64,
    in_fade: bool,
}

impl FadeIn {
    pub const NAME: &'static str = "fade_in";

    pub fn new(signals: &mut SignalRegistry, fps: f64) -> Self {
        let mut core = ProcessCore::new(signals, Self::NAME);
        let complete = core.register(signals, "COMPLETE");
        Self {
            core,
            complete,
            fps,
            in_fade: false,
        }
    }
}

impl Process for FadeIn {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessCore {
        &mut self.core
    }

    fn execute(&mut self, ctx: &mut RunContext<'_>) -> SignalId {
        if ctx.incoming_split() && ctx.state.fade_status == FadeStatus::FadeInComplete {
            ctx.split();
        }

        if ctx.state.fade_status == FadeStatus::FadeInPartial {
            return self.core.loop_signal();
        }
        self.in_fade = false;
        self.complete
    }

    fn on_transition(&mut self, ctx: &mut RunContext<'_>) {
        ctx.set_fps(self.fps);
        ctx.enable_predictions(false);
        self.in_fade = true;
    }

    fn relinquish(&self) -> bool {
        !self.in_fade
    }
}
