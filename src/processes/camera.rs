//! Camera-event checkpoints

use crate::engine::{Process, ProcessCore, SignalId, SignalRegistry};
use crate::run::RunContext;

/// Split once the checkpoint's camera-event count is reached
pub struct CameraSplit {
    core: ProcessCore,
    fade_out: SignalId,
    complete: SignalId,
    fps: f64,
}

impl CameraSplit {
    pub const NAME: &'static str = "camera_split";

    pub fn new(signals: &mut SignalRegistry, fps: f64) -> Self {
        let mut core = ProcessCore::new(signals, Self::NAME);
        let complete = core.register(signals, "COMPLETE");
        let fade_out = signals.shared("FADE_OUT");
        Self {
            core,
            fade_out,
            complete,
            fps,
        }
    }
}

impl Process for CameraSplit {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessCore {
        &mut self.core
    }

    fn execute(&mut self, ctx: &mut RunContext<'_>) -> SignalId {
        if ctx.state.fade_status.is_fade_out() {
            return self.fade_out;
        }

        if ctx.incoming_split() && ctx.split() {
            return self.complete;
        }
        self.core.loop_signal()
    }

    fn on_transition(&mut self, ctx: &mut RunContext<'_>) {
        ctx.set_fps(self.fps);
        ctx.enable_predictions(true);
    }
}
