//! Processor - composite process with a transition table
//!
//! A processor drives exactly one active child. Child signals are looked up
//! in the table keyed by `(child, signal)`; a hit makes the destination
//! active on the next call, a miss bubbles the signal to the caller.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::process::{Process, ProcessCore, ProcessRef, activate};
use super::signal::{SignalId, SignalRegistry};
use crate::run::RunContext;

pub struct Processor {
    core: ProcessCore,
    processes: Vec<ProcessRef>,
    names: Vec<String>,
    initial: Option<usize>,
    current: Option<usize>,
    /// Child that ran on the previous call; differs from `current` on an entry edge
    previous: Option<usize>,
    transitions: HashMap<(usize, SignalId), usize>,
    globals: Vec<(SignalId, usize)>,
}

impl Processor {
    pub fn new(signals: &mut SignalRegistry, name: impl Into<String>) -> Self {
        Self {
            core: ProcessCore::anonymous(signals, name),
            processes: Vec::new(),
            names: Vec::new(),
            initial: None,
            current: None,
            previous: None,
            transitions: HashMap::new(),
            globals: Vec::new(),
        }
    }

    /// Set the child that becomes active whenever this processor is entered
    pub fn set_initial(&mut self, process: &ProcessRef) {
        let index = self.add_process(process);
        self.initial = Some(index);
        if self.current.is_none() {
            self.current = Some(index);
        }
    }

    /// Add a child, returning its slot. Adding the same handle twice is a no-op.
    pub fn add_process(&mut self, process: &ProcessRef) -> usize {
        if let Some(index) = self.index_of(process) {
            return index;
        }

        let index = self.processes.len();
        self.processes.push(Rc::clone(process));
        self.names.push(process.borrow().name().to_string());

        for &(signal, dest) in &self.globals {
            self.transitions.entry((index, signal)).or_insert(dest);
        }
        index
    }

    /// Register a transition.
    ///
    /// `source = None` declares a global transition: it applies to every child
    /// already present and every child added later, unless that child has its
    /// own entry for the signal.
    pub fn add_transition(&mut self, source: Option<&ProcessRef>, signal: SignalId, dest: &ProcessRef) {
        let dest = self.add_process(dest);
        match source {
            Some(source) => {
                let source = self.add_process(source);
                self.transitions.insert((source, signal), dest);
            }
            None => {
                self.globals.push((signal, dest));
                for index in 0..self.processes.len() {
                    self.transitions.entry((index, signal)).or_insert(dest);
                }
            }
        }
    }

    /// Name of the child that will run on the next call
    pub fn active_name(&self) -> Option<&str> {
        self.current.map(|i| self.names[i].as_str())
    }

    pub fn initial_name(&self) -> Option<&str> {
        self.initial.map(|i| self.names[i].as_str())
    }

    pub fn is_active(&self, process: &ProcessRef) -> bool {
        self.current.is_some() && self.current == self.index_of(process)
    }

    /// Destination name for `(source, signal)`, looked up by child name
    pub fn destination(&self, source: &str, signal: SignalId) -> Option<&str> {
        let source = self.names.iter().position(|n| n == source)?;
        self.transitions
            .get(&(source, signal))
            .map(|&dest| self.names[dest].as_str())
    }

    pub fn process_names(&self) -> &[String] {
        &self.names
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    fn index_of(&self, process: &ProcessRef) -> Option<usize> {
        self.processes.iter().position(|p| Rc::ptr_eq(p, process))
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.core.name())
            .field("active", &self.active_name())
            .field("children", &self.names)
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

impl Process for Processor {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessCore {
        &mut self.core
    }

    fn execute(&mut self, ctx: &mut RunContext<'_>) -> SignalId {
        // After a bubbled signal the processor restarts from its initial child
        let Some(index) = self.current.or(self.initial) else {
            return self.core.loop_signal();
        };
        self.current = Some(index);

        let signal = {
            let mut process = self.processes[index].borrow_mut();
            if self.previous != Some(index) {
                activate(&mut *process, ctx);
            }
            self.previous = Some(index);

            let signal = process.execute(ctx);
            if signal == process.loop_signal() {
                return self.core.loop_signal();
            }
            signal
        };

        match self.transitions.get(&(index, signal)) {
            Some(&dest) => {
                log::debug!(
                    "{}: {} -> {} on {}",
                    self.core.name(),
                    self.names[index],
                    self.names[dest],
                    signal
                );
                if dest == index {
                    // Self-transition re-enters the child
                    self.previous = None;
                }
                self.current = Some(dest);
                self.core.loop_signal()
            }
            None => {
                log::debug!("{}: {} bubbled {}", self.core.name(), self.names[index], signal);
                self.current = None;
                self.previous = None;
                signal
            }
        }
    }

    fn on_transition(&mut self, _ctx: &mut RunContext<'_>) {
        self.current = self.initial;
        self.previous = None;
    }

    fn relinquish(&self) -> bool {
        self.current
            .and_then(|i| self.processes[i].try_borrow().ok().map(|p| p.relinquish()))
            .unwrap_or(true)
    }
}


#[cfg(test)]
mod tests {
    use super::probe::Probe;
    use super::*;
    use crate::route::{Route, Split};
    use crate::run::context::fixture::Fixture;

    fn fixture() -> Fixture {
        Fixture::new(Route::new("t", vec![Split::new("A", "progress").with_progress(1)]))
    }

    #[test]
    fn test_loop_keeps_active_process() {
        let mut signals = SignalRegistry::new();
        let a = Probe::shared(&mut signals, "a");
        let a_ref: ProcessRef = a.clone();
        let mut processor = Processor::new(&mut signals, "p");
        processor.set_initial(&a_ref);

        let mut fx = fixture();
        for _ in 0..50 {
            let result = processor.execute(&mut fx.ctx());
            assert_eq!(result, processor.loop_signal());
            assert_eq!(processor.active_name(), Some("a"));
        }
        assert_eq!(a.borrow().executions, 50);
    }

    #[test]
    fn test_on_transition_once_per_activation() {
        let mut signals = SignalRegistry::new();
        let a = Probe::shared(&mut signals, "a");
        let a_ref: ProcessRef = a.clone();
        let mut processor = Processor::new(&mut signals, "p");
        processor.set_initial(&a_ref);

        let mut fx = fixture();
        processor.execute(&mut fx.ctx());
        processor.execute(&mut fx.ctx());
        assert_eq!(a.borrow().entries, 1);

        processor.on_transition(&mut fx.ctx());
        processor.execute(&mut fx.ctx());
        assert_eq!(a.borrow().entries, 2);
    }

    #[test]
    fn test_transition_is_deferred_to_next_call() {
        let mut signals = SignalRegistry::new();
        let a = Probe::shared(&mut signals, "a");
        let b = Probe::shared(&mut signals, "b");
        let go = a.borrow_mut().signal(&mut signals, "GO");
        let (a_ref, b_ref): (ProcessRef, ProcessRef) = (a.clone(), b.clone());

        let mut processor = Processor::new(&mut signals, "p");
        processor.set_initial(&a_ref);
        processor.add_transition(Some(&a_ref), go, &b_ref);

        let mut fx = fixture();
        a.borrow_mut().emit(go);
        assert_eq!(processor.execute(&mut fx.ctx()), processor.loop_signal());
        assert_eq!(b.borrow().executions, 0);
        assert_eq!(processor.active_name(), Some("b"));

        processor.execute(&mut fx.ctx());
        assert_eq!(b.borrow().entries, 1);
        assert_eq!(b.borrow().executions, 1);
    }

    #[test]
    fn test_unmatched_signal_bubbles() {
        let mut signals = SignalRegistry::new();
        let a = Probe::shared(&mut signals, "a");
        let done = a.borrow_mut().signal(&mut signals, "DONE");
        let a_ref: ProcessRef = a.clone();

        let mut processor = Processor::new(&mut signals, "p");
        processor.set_initial(&a_ref);

        let mut fx = fixture();
        a.borrow_mut().emit(done);
        assert_eq!(processor.execute(&mut fx.ctx()), done);

        // Next call restarts from the initial child
        processor.execute(&mut fx.ctx());
        assert_eq!(a.borrow().entries, 2);
    }

    #[test]
    fn test_global_transition_retrofitted_and_local_wins() {
        let mut signals = SignalRegistry::new();
        let a = Probe::shared(&mut signals, "a");
        let b = Probe::shared(&mut signals, "b");
        let c = Probe::shared(&mut signals, "c");
        let handler = Probe::shared(&mut signals, "handler");
        let fade = signals.shared("FADE_OUT");
        let (a_ref, b_ref, c_ref, h_ref): (ProcessRef, ProcessRef, ProcessRef, ProcessRef) =
            (a.clone(), b.clone(), c.clone(), handler.clone());

        let mut processor = Processor::new(&mut signals, "p");
        processor.set_initial(&a_ref);
        processor.add_transition(Some(&b_ref), fade, &c_ref);
        processor.add_transition(None, fade, &h_ref);
        processor.add_process(&c_ref);

        assert_eq!(processor.destination("a", fade), Some("handler"));
        assert_eq!(processor.destination("b", fade), Some("c"));
        assert_eq!(processor.destination("c", fade), Some("handler"));
    }

    #[test]
    fn test_self_transition_re_enters() {
        let mut signals = SignalRegistry::new();
        let a = Probe::shared(&mut signals, "a");
        let again = a.borrow_mut().signal(&mut signals, "AGAIN");
        let a_ref: ProcessRef = a.clone();

        let mut processor = Processor::new(&mut signals, "p");
        processor.set_initial(&a_ref);
        processor.add_transition(Some(&a_ref), again, &a_ref);

        let mut fx = fixture();
        a.borrow_mut().emit(again);
        processor.execute(&mut fx.ctx());
        processor.execute(&mut fx.ctx());
        assert_eq!(a.borrow().entries, 2);
    }

    #[test]
    fn test_relinquish_delegates_to_active_child() {
        let mut signals = SignalRegistry::new();
        let a = Probe::shared(&mut signals, "a");
        let a_ref: ProcessRef = a.clone();
        let mut processor = Processor::new(&mut signals, "p");
        processor.set_initial(&a_ref);

        assert!(processor.relinquish());
        a.borrow_mut().hold = true;
        assert!(!processor.relinquish());
    }

    #[test]
    fn test_nested_processor_relinquish_is_recursive() {
        let mut signals = SignalRegistry::new();
        let leaf = Probe::shared(&mut signals, "leaf");
        let leaf_ref: ProcessRef = leaf.clone();
        let mut inner = Processor::new(&mut signals, "inner");
        inner.set_initial(&leaf_ref);
        let inner_ref = crate::engine::shared(inner);

        let mut outer = Processor::new(&mut signals, "outer");
        outer.set_initial(&inner_ref);

        leaf.borrow_mut().hold = true;
        assert!(!outer.relinquish());
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let mut signals = SignalRegistry::new();
        let a = Probe::shared(&mut signals, "a");
        let a_ref: ProcessRef = a.clone();
        let mut processor = Processor::new(&mut signals, "p");
        assert_eq!(processor.add_process(&a_ref), processor.add_process(&a_ref));
        assert_eq!(processor.process_names().len(), 1);
    }

    #[test]
    fn test_debug_names_processor_and_active_child() {
        let mut signals = SignalRegistry::new();
        let a = Probe::shared(&mut signals, "a");
        let a_ref: ProcessRef = a.clone();
        let mut processor = Processor::new(&mut signals, "progress");
        processor.set_initial(&a_ref);

        let text = format!("{:?}", processor);
        assert!(text.starts_with("Processor"));
        assert!(text.contains("\"progress\""));
        assert!(text.contains("Some(\"a\")"));

        let failed: std::result::Result<Processor, String> = Err("unresolved".to_string());
        assert_eq!(failed.unwrap_err(), "unresolved");
    }
}
