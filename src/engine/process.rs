//! Process trait - the atomic behaviour unit
//!
//! A process advances one frame per `execute()` call and answers with a
//! signal: its own loop signal to stay active, or one of its registered
//! signals to ask the enclosing processor for a transition.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::signal::{LOOP_SIGNAL, SignalId, SignalRegistry};
use crate::run::RunContext;

/// Shared handle to a process. Processes are singletons that may appear in
/// several processors, so they are reference counted.
pub type ProcessRef = Rc<RefCell<dyn Process>>;

/// Elapsed time since the owning process was last activated
#[derive(Debug, Clone, Default)]
pub struct ProcessClock {
    entered_at: Option<Instant>,
}

impl ProcessClock {
    pub fn reset(&mut self, now: Instant) {
        self.entered_at = Some(now);
    }

    /// Time since the last reset; zero if never activated
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.entered_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default()
    }
}

/// Identity and bookkeeping every process carries
#[derive(Debug, Clone)]
pub struct ProcessCore {
    name: String,
    loop_signal: SignalId,
    owned: Vec<SignalId>,
    clock: ProcessClock,
}

impl ProcessCore {
    /// Core for a named process; registers `<name>.LOOP`
    pub fn new(signals: &mut SignalRegistry, name: impl Into<String>) -> Self {
        let name = name.into();
        let loop_signal = signals.register(&name, LOOP_SIGNAL);
        Self {
            name,
            loop_signal,
            owned: vec![loop_signal],
            clock: ProcessClock::default(),
        }
    }

    /// Core whose loop signal is not addressable by name
    pub fn anonymous(signals: &mut SignalRegistry, name: impl Into<String>) -> Self {
        let name = name.into();
        let loop_signal = signals.allocate(&format!("{}.{}", name, LOOP_SIGNAL));
        Self {
            name,
            loop_signal,
            owned: vec![loop_signal],
            clock: ProcessClock::default(),
        }
    }

    /// Register a signal owned by this process
    pub fn register(&mut self, signals: &mut SignalRegistry, signal: &str) -> SignalId {
        let id = signals.register(&self.name, signal);
        if !self.owned.contains(&id) {
            self.owned.push(id);
        }
        id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn loop_signal(&self) -> SignalId {
        self.loop_signal
    }

    /// Signals this process registered, loop signal first
    pub fn owned_signals(&self) -> &[SignalId] {
        &self.owned
    }

    pub fn clock(&self) -> &ProcessClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut ProcessClock {
        &mut self.clock
    }
}

/// Behaviour unit driven by a `Processor`
pub trait Process {
    fn core(&self) -> &ProcessCore;

    fn core_mut(&mut self) -> &mut ProcessCore;

    /// Advance one frame.
    ///
    /// Returns the process's loop signal to stay active, or a registered
    /// signal to request a transition.
    fn execute(&mut self, ctx: &mut RunContext<'_>) -> SignalId;

    /// Called once each time the process becomes active, after its clock
    /// has been reset. Reset per-activation counters here.
    fn on_transition(&mut self, _ctx: &mut RunContext<'_>) {}

    /// Whether the process may be deactivated right now
    fn relinquish(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn loop_signal(&self) -> SignalId {
        self.core().loop_signal()
    }

    /// Time spent active since the last `on_transition`
    fn loop_time(&self, now: Instant) -> Duration {
        self.core().clock().elapsed(now)
    }
}

/// Make `process` the active process: reset its clock, then run its entry hook
pub fn activate(process: &mut dyn Process, ctx: &mut RunContext<'_>) {
    process.core_mut().clock_mut().reset(ctx.now());
    process.on_transition(ctx);
}

/// Wrap a process into a shared handle
pub fn shared<P: Process + 'static>(process: P) -> ProcessRef {
    Rc::new(RefCell::new(process))
}
