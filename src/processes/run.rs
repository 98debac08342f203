//! Run lifecycle processes: waiting for the game, run start, reset

use std::time::Duration;

use crate::engine::{Process, ProcessCore, SignalId, SignalRegistry};
use crate::run::RunContext;

/// Idle until the first fade-out
pub struct Wait {
    core: ProcessCore,
    fade_out: SignalId,
    fps: f64,
}

impl Wait {
    pub const NAME: &'static str = "wait";

    pub fn new(signals: &mut SignalRegistry, fps: f64) -> Self {
        let mut core = ProcessCore::new(signals, Self::NAME);
        let fade_out = core.register(signals, "FADEOUT");
        Self { core, fade_out, fps }
    }
}

impl Process for Wait {
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
        self.core.loop_signal()
    }

    fn on_transition(&mut self, ctx: &mut RunContext<'_>) {
        ctx.enable_predictions(false);
        ctx.set_fps(self.fps);
    }
}

/// Wait for the classifier to agree with the starting progress, then count fades.
///
/// With forward skip enabled, a run can also start mid-route once the same
/// in-range reading repeats enough times.
pub struct RunStart {
    core: ProcessCore,
    fade_out: SignalId,
    start: SignalId,
    fps: f64,
    detection: f64,
    min_repeats: u32,
    last_class: Option<u32>,
    repeats: u32,
}

impl RunStart {
    pub const NAME: &'static str = "run_start";

    pub fn new(signals: &mut SignalRegistry, fps: f64, detection: f64) -> Self {
        let mut core = ProcessCore::new(signals, Self::NAME);
        let fade_out = core.register(signals, "FADEOUT");
        let start = core.register(signals, "START");
        Self {
            core,
            fade_out,
            start,
            fps,
            detection,
            min_repeats: 4,
            last_class: None,
            repeats: 0,
        }
    }
}

impl Process for RunStart {
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

        let Some(sample) = ctx.state.last_sample else {
            return self.core.loop_signal();
        };
        if sample.confidence <= self.detection {
            return self.core.loop_signal();
        }

        if sample.class == ctx.state.progress {
            ctx.enable_counting(true);
            return self.start;
        }

        if !ctx.route.forward_skip {
            return self.core.loop_signal();
        }
        let floor = ctx.route.progress_floor(ctx.state.split_index);
        let Some(ceiling) = ctx.current_split().and_then(|s| s.progress) else {
            return self.core.loop_signal();
        };
        if !(floor..=ceiling).contains(&sample.class) {
            return self.core.loop_signal();
        }

        if self.last_class == Some(sample.class) {
            self.repeats += 1;
        } else {
            self.repeats = 0;
        }
        self.last_class = Some(sample.class);

        if self.repeats >= self.min_repeats {
            log::info!("Mid-route start at progress {}", sample.class);
            ctx.enable_counting(true);
            ctx.set_progress(sample.class);
            self.repeats = 0;
            self.last_class = None;
            return self.start;
        }
        self.core.loop_signal()
    }

    fn on_transition(&mut self, ctx: &mut RunContext<'_>) {
        ctx.enable_counting(false);
        ctx.enable_predictions(true);
        ctx.set_fps(self.fps);
        self.last_class = None;
        self.repeats = 0;
    }
}

/// Reset the timer and restart the run after a console reset
pub struct Reset {
    core: ProcessCore,
    reset: SignalId,
    srl_mode: bool,
    restart_delay: Duration,
}

impl Reset {
    pub const NAME: &'static str = "reset";

    pub fn new(signals: &mut SignalRegistry, srl_mode: bool, restart_delay: Duration) -> Self {
        let mut core = ProcessCore::new(signals, Self::NAME);
        let reset = core.register(signals, "RESET");
        Self {
            core,
            reset,
            srl_mode,
            restart_delay,
        }
    }
}

impl Process for Reset {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessCore {
        &mut self.core
    }

    fn execute(&mut self, ctx: &mut RunContext<'_>) -> SignalId {
        if !self.srl_mode {
            // The reset command goes out on entry; the restart split waits out the delay
            if self.loop_time(ctx.now()) < self.restart_delay {
                return self.core.loop_signal();
            }
            ctx.split();
        }

        ctx.enable_counting(false);
        let initial = ctx.route.initial_progress;
        ctx.set_progress(initial);
        self.reset
    }

    fn on_transition(&mut self, ctx: &mut RunContext<'_>) {
        if !self.srl_mode {
            ctx.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::activate;
    use crate::route::{Route, Split};
    use crate::run::context::fixture::Fixture;
    use crate::state::{FadeStatus, Prediction};
    use crate::timer::TimerCommand;

    fn fixture() -> Fixture {
        Fixture::new(Route::new(
            "t",
            vec![
                Split::new("A", "progress").with_progress(1).with_fade_out(1),
                Split::new("B", "progress").with_progress(5).with_fade_out(1),
            ],
        ))
    }

    #[test]
    fn test_wait_leaves_on_fade_out() {
        let mut signals = SignalRegistry::new();
        let mut wait = Wait::new(&mut signals, 10.0);
        let mut fx = fixture();

        activate(&mut wait, &mut fx.ctx());
        assert!(!fx.state.predictions_enabled);
        assert_eq!(wait.execute(&mut fx.ctx()), wait.loop_signal());

        fx.state.fade_status = FadeStatus::FadeOutPartial;
        assert_eq!(wait.execute(&mut fx.ctx()), signals.lookup("wait", "FADEOUT").unwrap());
    }

    #[test]
    fn test_run_start_confirms_initial_progress() {
        let mut signals = SignalRegistry::new();
        let mut process = RunStart::new(&mut signals, 6.0, 0.5);
        let mut fx = fixture();

        activate(&mut process, &mut fx.ctx());
        assert_eq!(fx.state.target_fps, 6.0);
        assert!(!fx.state.counting_enabled);

        fx.state.last_sample = Some(Prediction::new(0, 0.4));
        assert_eq!(process.execute(&mut fx.ctx()), process.loop_signal());

        fx.state.last_sample = Some(Prediction::new(0, 0.9));
        assert_eq!(process.execute(&mut fx.ctx()), signals.lookup("run_start", "START").unwrap());
        assert!(fx.state.counting_enabled);
    }

    #[test]
    fn test_run_start_mid_route_jump() {
        let mut signals = SignalRegistry::new();
        let mut process = RunStart::new(&mut signals, 6.0, 0.5);
        let mut route = Route::new(
            "t",
            vec![
                Split::new("A", "progress").with_progress(1).with_fade_out(1),
                Split::new("B", "progress").with_progress(5).with_fade_out(1),
            ],
        );
        route.forward_skip = true;
        let mut fx = Fixture::new(route);
        fx.state.split_index = 1;

        activate(&mut process, &mut fx.ctx());
        fx.state.last_sample = Some(Prediction::new(3, 0.9));
        for _ in 0..4 {
            assert_eq!(process.execute(&mut fx.ctx()), process.loop_signal());
        }
        assert_eq!(process.execute(&mut fx.ctx()), signals.lookup("run_start", "START").unwrap());
        assert_eq!(fx.state.progress, 3);
    }

    #[test]
    fn test_reset_waits_for_restart_delay() {
        let mut signals = SignalRegistry::new();
        let mut process = Reset::new(&mut signals, false, Duration::from_secs(1));
        let mut fx = fixture();
        fx.state.progress = 4;
        fx.state.timer_running = true;

        let mut ctx = fx.ctx();
        activate(&mut process, &mut ctx);
        assert_eq!(process.execute(&mut ctx), process.loop_signal());
        assert_eq!(ctx.into_commands(), vec![TimerCommand::Reset]);

        fx.advance(Duration::from_millis(1200));
        let mut ctx = fx.ctx();
        assert_eq!(process.execute(&mut ctx), signals.lookup("reset", "RESET").unwrap());
        assert_eq!(ctx.into_commands(), vec![TimerCommand::Split]);
        assert_eq!(fx.state.progress, 0);
        assert!(fx.state.timer_running);
    }

    #[test]
    fn test_reset_in_srl_mode_keeps_timer() {
        let mut signals = SignalRegistry::new();
        let mut process = Reset::new(&mut signals, true, Duration::from_secs(1));
        let mut fx = fixture();
        fx.state.progress = 4;

        let mut ctx = fx.ctx();
        activate(&mut process, &mut ctx);
        assert_eq!(process.execute(&mut ctx), signals.lookup("reset", "RESET").unwrap());
        assert!(ctx.into_commands().is_empty());
        assert_eq!(fx.state.progress, 0);
    }
}
