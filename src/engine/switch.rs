//! ProcessorSwitch - top-level scheduler keyed by checkpoint kind

use std::collections::{HashMap, HashSet};

use super::process::{Process, activate};
use super::processor::Processor;
use super::signal::SignalId;
use crate::run::RunContext;

/// Selects which processor runs this tick based on the current checkpoint kind
#[derive(Default)]
pub struct ProcessorSwitch {
    processors: HashMap<String, Processor>,
    active: Option<String>,
    previous: Option<String>,
    restart_pending: bool,
    warned: HashSet<String>,
}

impl ProcessorSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, processor: Processor) {
        let kind = kind.into();
        log::debug!("Registered processor for kind '{}'", kind);
        self.processors.insert(kind, processor);
    }

    /// Run one tick of the processor for `kind`.
    ///
    /// Returns a signal only when it bubbled past the processor. The switch
    /// moves to a new kind only once the active processor relinquishes.
    pub fn execute(&mut self, kind: &str, ctx: &mut RunContext<'_>) -> Option<SignalId> {
        if !self.processors.contains_key(kind) {
            if self.warned.insert(kind.to_string()) {
                log::warn!("No processor registered for checkpoint kind '{}'", kind);
            }
            return None;
        }

        let entering = match self.active.as_deref() {
            None => true,
            Some(active) if active == kind => false,
            Some(active) => self.processors.get(active).is_none_or(|p| p.relinquish()),
        };
        if entering {
            log::info!(
                "Processor switch: {} -> {}",
                self.active.as_deref().unwrap_or("<none>"),
                kind
            );
            self.previous = self.active.replace(kind.to_string());
        }

        let active = self.active.as_deref()?;
        let processor = self.processors.get_mut(active)?;

        if entering || self.restart_pending {
            activate(processor, ctx);
            self.restart_pending = false;
        }

        let signal = processor.execute(ctx);
        if signal == processor.loop_signal() {
            return None;
        }

        log::warn!(
            "Signal {} bubbled out of processor '{}'; restarting it next tick",
            signal,
            active
        );
        self.restart_pending = true;
        Some(signal)
    }

    pub fn active_kind(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn previous_kind(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn get(&self, kind: &str) -> Option<&Processor> {
        self.processors.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.processors.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        kinds.sort();
        kinds
    }

    /// Forget the active kind so the next tick enters afresh
    pub fn reset(&mut self) {
        self.previous = self.active.take();
        self.restart_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ProcessRef;
    use crate::engine::SignalRegistry;
    use crate::engine::processor::probe::Probe;
    use crate::route::{Route, Split};
    use crate::run::context::fixture::Fixture;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fixture() -> Fixture {
        Fixture::new(Route::new("t", vec![Split::new("A", "progress").with_progress(1)]))
    }

    fn processor_with(signals: &mut SignalRegistry, name: &str) -> (Processor, Rc<RefCell<Probe>>) {
        let probe = Probe::shared(signals, name);
        let probe_ref: ProcessRef = probe.clone();
        let mut processor = Processor::new(signals, name);
        processor.set_initial(&probe_ref);
        (processor, probe)
    }

    #[test]
    fn test_unknown_kind_is_noop() {
        let mut switch = ProcessorSwitch::new();
        let mut fx = fixture();
        assert_eq!(switch.execute("missing", &mut fx.ctx()), None);
        assert_eq!(switch.active_kind(), None);
    }

    #[test]
    fn test_switch_enters_once_per_kind_change() {
        let mut signals = SignalRegistry::new();
        let (progress, progress_probe) = processor_with(&mut signals, "progress");
        let (fade, fade_probe) = processor_with(&mut signals, "fade");
        let mut switch = ProcessorSwitch::new();
        switch.register("progress", progress);
        switch.register("fade", fade);

        let mut fx = fixture();
        for _ in 0..3 {
            switch.execute("progress", &mut fx.ctx());
        }
        assert_eq!(progress_probe.borrow().entries, 1);

        switch.execute("fade", &mut fx.ctx());
        switch.execute("fade", &mut fx.ctx());
        assert_eq!(fade_probe.borrow().entries, 1);
        assert_eq!(switch.active_kind(), Some("fade"));
        assert_eq!(switch.previous_kind(), Some("progress"));

        switch.execute("progress", &mut fx.ctx());
        assert_eq!(progress_probe.borrow().entries, 2);
    }

    #[test]
    fn test_never_switches_while_holding() {
        let mut signals = SignalRegistry::new();
        let (progress, progress_probe) = processor_with(&mut signals, "progress");
        let (fade, fade_probe) = processor_with(&mut signals, "fade");
        let (camera, camera_probe) = processor_with(&mut signals, "camera");
        let mut switch = ProcessorSwitch::new();
        switch.register("progress", progress);
        switch.register("fade", fade);
        switch.register("camera", camera);

        let mut fx = fixture();
        switch.execute("progress", &mut fx.ctx());
        progress_probe.borrow_mut().hold = true;

        for kind in ["fade", "camera", "fade", "missing", "camera", "progress", "fade"] {
            switch.execute(kind, &mut fx.ctx());
            assert_eq!(switch.active_kind(), Some("progress"));
        }
        assert_eq!(fade_probe.borrow().executions, 0);
        assert_eq!(camera_probe.borrow().executions, 0);

        progress_probe.borrow_mut().hold = false;
        switch.execute("camera", &mut fx.ctx());
        assert_eq!(switch.active_kind(), Some("camera"));
        assert_eq!(camera_probe.borrow().executions, 1);
    }

    #[test]
    fn test_bubbled_signal_restarts_processor() {
        let mut signals = SignalRegistry::new();
        let (progress, probe) = processor_with(&mut signals, "progress");
        let done = probe.borrow_mut().signal(&mut signals, "DONE");
        let mut switch = ProcessorSwitch::new();
        switch.register("progress", progress);

        let mut fx = fixture();
        probe.borrow_mut().emit(done);
        assert_eq!(switch.execute("progress", &mut fx.ctx()), Some(done));
        assert_eq!(switch.execute("progress", &mut fx.ctx()), None);
        assert_eq!(probe.borrow().entries, 2);
    }

    #[test]
    fn test_kinds_sorted() {
        let mut signals = SignalRegistry::new();
        let mut switch = ProcessorSwitch::new();
        switch.register("progress", processor_with(&mut signals, "progress").0);
        switch.register("camera", processor_with(&mut signals, "camera").0);
        assert_eq!(switch.kinds(), vec!["camera", "progress"]);
        assert!(switch.contains("camera"));
    }
}
