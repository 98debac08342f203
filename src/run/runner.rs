//! Runner - the main loop
//!
//! Each tick captures a frame, runs perception and correction, executes the
//! processor for the current checkpoint kind, then dispatches the timer
//! commands the processes queued. The loop then sleeps for whatever is left
//! of the frame period requested by the active process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::context::RunContext;
use crate::config::Settings;
use crate::correction::CorrectionEngine;
use crate::engine::ProcessorSwitch;
use crate::error::{Result, SplitError};
use crate::perception::{CaptureSource, Perception, ProgressModel};
use crate::route::Route;
use crate::state::{GameState, StateSnapshot};
use crate::timer::TimerClient;

/// How long to stop asking the timer for its index after a failed query
const INDEX_SYNC_BACKOFF: Duration = Duration::from_secs(5);

/// Receives status updates and recovered errors from the loop
pub trait RunListener {
    /// Progress, checkpoint index or fade status changed
    fn on_update(&mut self, snapshot: &StateSnapshot);

    /// A non-fatal error, or the fatal error that stopped the loop
    fn on_error(&mut self, error: &SplitError);
}

/// Listener that only logs
#[derive(Debug, Default)]
pub struct LogListener;

impl RunListener for LogListener {
    fn on_update(&mut self, snapshot: &StateSnapshot) {
        log::debug!(
            "progress={} split={} fade={}",
            snapshot.progress,
            snapshot.split_index,
            snapshot.fade_status
        );
    }

    fn on_error(&mut self, error: &SplitError) {
        log::warn!("{}", error);
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickResult {
    /// Tick completed normally
    Ok,
    /// Tick issued timer commands
    Commands(usize),
    /// Stop flag was set before the tick started
    Stopped,
}

/// Counters kept across ticks
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub ticks: u64,
    pub samples: u64,
    pub dropped_samples: u64,
    pub commands: u64,
    pub timer_errors: u64,
}

/// Why the loop ended
#[derive(Debug)]
pub enum StopReason {
    /// The stop flag was set
    Requested,
    /// The capture backend failed
    CaptureFailed(SplitError),
}

pub struct Runner {
    capture: Box<dyn CaptureSource>,
    model: Box<dyn ProgressModel>,
    timer: Box<dyn TimerClient>,
    perception: Perception,
    correction: CorrectionEngine,
    switch: ProcessorSwitch,
    route: Route,
    state: GameState,
    split_cooldown: Duration,
    default_fps: f64,
    listener: Box<dyn RunListener>,
    stop: Arc<AtomicBool>,
    last_snapshot: Option<StateSnapshot>,
    sync_paused_until: Option<Instant>,
    stats: RunStats,
}

impl Runner {
    pub fn new(
        route: Route,
        switch: ProcessorSwitch,
        settings: &Settings,
        capture: Box<dyn CaptureSource>,
        model: Box<dyn ProgressModel>,
        timer: Box<dyn TimerClient>,
    ) -> Self {
        let state = GameState::new(
            route.initial_progress,
            settings.correction.window_len,
            settings.general.default_fps,
        );
        Self {
            capture,
            model,
            timer,
            perception: Perception::new(settings.perception(), settings.camera_detector()),
            correction: CorrectionEngine::new(settings.correction()),
            switch,
            route,
            state,
            split_cooldown: settings.split_cooldown(),
            default_fps: settings.general.default_fps,
            listener: Box::new(LogListener),
            stop: Arc::new(AtomicBool::new(false)),
            last_snapshot: None,
            sync_paused_until: None,
            stats: RunStats::default(),
        }
    }

    pub fn with_listener(mut self, listener: Box<dyn RunListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_perception(mut self, perception: Perception) -> Self {
        self.perception = perception;
        self
    }

    /// Flag polled once per tick; set it to stop the loop
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Drive ticks until the stop flag is set or capture fails
    pub fn run(&mut self) -> StopReason {
        log::info!(
            "Run started: '{}' ({} checkpoints, {:?} mode)",
            self.route.title,
            self.route.len(),
            self.route.mode
        );

        loop {
            let started = Instant::now();
            match self.tick(started) {
                Ok(TickResult::Stopped) => {
                    log::info!("Run stopped after {} ticks", self.stats.ticks);
                    return StopReason::Requested;
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("Run stopped: {}", e);
                    self.listener.on_error(&e);
                    return StopReason::CaptureFailed(e);
                }
            }

            let period = self.frame_period();
            let elapsed = started.elapsed();
            if let Some(remaining) = period.checked_sub(elapsed) {
                thread::sleep(remaining);
            } else {
                log::trace!("Tick overran its {:?} period by {:?}", period, elapsed - period);
            }
        }
    }

    /// Process one frame.
    ///
    /// Only capture failures are returned as errors; everything else is
    /// reported to the listener and the tick carries on.
    pub fn tick(&mut self, now: Instant) -> Result<TickResult> {
        if self.stop.load(Ordering::SeqCst) {
            return Ok(TickResult::Stopped);
        }
        self.stats.ticks += 1;

        self.capture.capture()?;
        self.sync_index(now);

        let sample = self
            .perception
            .analyze(self.capture.as_mut(), self.model.as_mut(), &mut self.state, now)?;
        if self.state.predictions_enabled {
            match sample {
                Some(_) => self.stats.samples += 1,
                None => self.stats.dropped_samples += 1,
            }
        }

        let mut ctx = RunContext::new(&mut self.state, &self.route, now).with_split_cooldown(self.split_cooldown);
        if let Some(sample) = sample
            && let Some(correction) = self.correction.apply(sample, &mut ctx)
        {
            log::debug!("Correction: {:?}", correction);
        }

        // Past the final checkpoint the last kind keeps running
        let kind = ctx
            .current_split()
            .or_else(|| self.route.splits.last())
            .map(|split| split.kind.as_str());
        if let Some(kind) = kind
            && let Some(signal) = self.switch.execute(kind, &mut ctx)
        {
            log::debug!("Signal {} reached the top of processor '{}'", signal, kind);
        }

        let commands = ctx.into_commands();
        for command in &commands {
            self.stats.commands += 1;
            if let Err(e) = self.timer.send(*command) {
                self.stats.timer_errors += 1;
                log::warn!("Timer command {} failed: {}", command, e);
                self.listener.on_error(&e);
            }
        }

        self.publish();
        if commands.is_empty() {
            Ok(TickResult::Ok)
        } else {
            Ok(TickResult::Commands(commands.len()))
        }
    }

    /// Adopt the timer's checkpoint index when it is reachable
    fn sync_index(&mut self, now: Instant) {
        if self.sync_paused_until.is_some_and(|until| now < until) {
            return;
        }

        match self.timer.query_index() {
            Ok(index) => {
                self.sync_paused_until = None;
                let index = index.min(self.route.len());
                if index > 0 {
                    // Someone started the timer by hand
                    self.state.timer_running = true;
                }
                if index != self.state.split_index {
                    log::info!("Timer index {} replaces local index {}", index, self.state.split_index);
                    self.state.split_index = index;
                    self.state.reset_counters();
                    self.correction.reset();
                }
            }
            Err(e) => {
                log::debug!("Split index query failed, keeping local index: {}", e);
                self.sync_paused_until = Some(now + INDEX_SYNC_BACKOFF);
            }
        }
    }

    fn publish(&mut self) {
        let snapshot = self.state.snapshot();
        let changed = self
            .last_snapshot
            .as_ref()
            .is_none_or(|last| snapshot.differs_from(last));
        if changed {
            self.listener.on_update(&snapshot);
            self.last_snapshot = Some(snapshot);
        }
    }

    fn frame_period(&self) -> Duration {
        let fps = if self.state.target_fps > 0.0 {
            self.state.target_fps
        } else {
            self.default_fps
        };
        Duration::try_from_secs_f64(1.0 / fps).unwrap_or_default()
    }
}
