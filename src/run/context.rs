//! Per-tick run context
//!
//! `RunContext` is what a process sees during one `execute()` call: the game
//! state borrowed mutably, the route, the tick timestamp and an outbox of
//! timer commands. Commands are dispatched by the runner after the processor
//! tree returns, so processes never touch the timer connection directly.

use std::time::{Duration, Instant};

use crate::route::{Route, Split};
use crate::state::GameState;
use crate::timer::TimerCommand;

pub struct RunContext<'a> {
    pub state: &'a mut GameState,
    pub route: &'a Route,
    now: Instant,
    split_cooldown: Duration,
    commands: Vec<TimerCommand>,
}

impl<'a> RunContext<'a> {
    pub fn new(state: &'a mut GameState, route: &'a Route, now: Instant) -> Self {
        Self {
            state,
            route,
            now,
            split_cooldown: Duration::ZERO,
            commands: Vec::new(),
        }
    }

    /// Minimum time between two accepted splits
    pub fn with_split_cooldown(mut self, cooldown: Duration) -> Self {
        self.split_cooldown = cooldown;
        self
    }

    /// Timestamp of the frame being processed
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn current_split(&self) -> Option<&'a Split> {
        self.route.split(self.state.split_index)
    }

    pub fn previous_split(&self) -> Option<&'a Split> {
        self.state.split_index.checked_sub(1).and_then(|i| self.route.split(i))
    }

    /// Whether the game state satisfies every condition of the current checkpoint
    pub fn incoming_split(&self) -> bool {
        self.current_split().is_some_and(|split| split.is_incoming(self.state))
    }

    /// Request a split. Returns false if the split was suppressed.
    ///
    /// The first split after a reset starts the timer and keeps the index.
    pub fn split(&mut self) -> bool {
        if let Some(at) = self.state.last_split_at
            && self.now.saturating_duration_since(at) < self.split_cooldown
        {
            log::debug!("Split suppressed: within cooldown");
            return false;
        }

        if self.state.split_index >= self.route.len() {
            log::debug!("Split suppressed: past final checkpoint");
            return false;
        }

        self.commands.push(TimerCommand::Split);
        self.state.last_split_at = Some(self.now);

        if self.state.timer_running {
            log::info!(
                "Split {} '{}'",
                self.state.split_index,
                self.current_split().map(|s| s.title.as_str()).unwrap_or_default()
            );
            self.advance_index(self.state.split_index + 1);
        } else {
            log::info!("Timer started");
            self.state.timer_running = true;
        }
        true
    }

    pub fn skip(&mut self) {
        self.commands.push(TimerCommand::Skip);
        if self.state.split_index < self.route.len() {
            self.advance_index(self.state.split_index + 1);
        }
    }

    pub fn undo(&mut self) {
        self.commands.push(TimerCommand::Undo);
        log::info!("Undo split {}", self.state.split_index);
        self.advance_index(self.state.split_index.saturating_sub(1));
    }

    /// Reset the timer and put the run back at its initial progress
    pub fn reset(&mut self) {
        self.commands.push(TimerCommand::Reset);
        log::info!("Run reset");
        self.state.timer_running = false;
        self.state.split_index = 0;
        self.state.last_reset_at = Some(self.now);
        self.state.set_progress(self.route.initial_progress, self.now);
    }

    pub fn set_progress(&mut self, progress: u32) {
        log::info!("Progress set: {} -> {}", self.state.progress, progress);
        self.state.set_progress(progress, self.now);
    }

    /// Frame rate the active process wants the loop to run at
    pub fn set_fps(&mut self, fps: f64) {
        self.state.target_fps = fps;
    }

    pub fn enable_predictions(&mut self, enable: bool) {
        self.state.predictions_enabled = enable;
    }

    pub fn enable_counting(&mut self, enable: bool) {
        self.state.enable_counting(enable);
    }

    /// Commands queued during this tick, in order
    pub fn commands(&self) -> &[TimerCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<TimerCommand> {
        self.commands
    }

    fn advance_index(&mut self, index: usize) {
        if index != self.state.split_index {
            self.state.split_index = index;
            self.state.reset_counters();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixture::Fixture;
    use super::*;

    fn route() -> Route {
        Route::new(
            "test",
            vec![
                Split::new("A", "progress").with_progress(1).with_fade_out(1),
                Split::new("B", "progress").with_progress(2).with_fade_out(1),
            ],
        )
    }

    #[test]
    fn test_first_split_starts_timer() {
        let mut fx = Fixture::new(route());
        let mut ctx = fx.ctx();
        assert!(ctx.split());
        assert_eq!(ctx.commands(), &[TimerCommand::Split]);
        assert!(fx.state.timer_running);
        assert_eq!(fx.state.split_index, 0);
    }

    #[test]
    fn test_split_advances_index_and_resets_counters() {
        let mut fx = Fixture::new(route());
        fx.state.timer_running = true;
        fx.state.fade_out_count = 1;

        let mut ctx = fx.ctx();
        assert!(ctx.split());
        assert_eq!(fx.state.split_index, 1);
        assert_eq!(fx.state.fade_out_count, 0);
    }

    #[test]
    fn test_split_cooldown() {
        let mut fx = Fixture::new(route());
        fx.state.timer_running = true;

        let mut ctx = fx.ctx().with_split_cooldown(Duration::from_secs(3));
        assert!(ctx.split());
        assert!(!ctx.split());
        assert_eq!(ctx.commands().len(), 1);

        fx.advance(Duration::from_secs(4));
        let mut ctx = fx.ctx().with_split_cooldown(Duration::from_secs(3));
        assert!(ctx.split());
    }

    #[test]
    fn test_split_past_end_ignored() {
        let mut fx = Fixture::new(route());
        fx.state.timer_running = true;
        fx.state.split_index = 2;

        let mut ctx = fx.ctx();
        assert!(!ctx.split());
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn test_undo_at_first_checkpoint_stays_at_zero() {
        let mut fx = Fixture::new(route());
        let mut ctx = fx.ctx();
        ctx.undo();
        assert_eq!(ctx.commands(), &[TimerCommand::Undo]);
        assert_eq!(fx.state.split_index, 0);
    }

    #[test]
    fn test_reset_restores_initial_progress() {
        let mut route = route();
        route.initial_progress = 1;
        let mut fx = Fixture::new(route);
        fx.state.progress = 5;
        fx.state.split_index = 1;
        fx.state.timer_running = true;

        let mut ctx = fx.ctx();
        ctx.reset();
        assert_eq!(fx.state.progress, 1);
        assert_eq!(fx.state.split_index, 0);
        assert!(!fx.state.timer_running);
        assert!(fx.state.last_reset_at.is_some());
    }

    #[test]
    fn test_incoming_split() {
        let mut fx = Fixture::new(route());
        fx.state.progress = 1;
        assert!(!fx.ctx().incoming_split());

        fx.state.fade_out_count = 1;
        assert!(fx.ctx().incoming_split());
    }

    #[test]
    fn test_previous_split_bounds() {
        let mut fx = Fixture::new(route());
        assert!(fx.ctx().previous_split().is_none());
        fx.state.split_index = 1;
        assert_eq!(fx.ctx().previous_split().map(|s| s.title.as_str()), Some("A"));
    }
}
