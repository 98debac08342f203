//! Process registry
//!
//! Global name → process table consulted by the definition loader. Populated
//! once at startup; every entry is a singleton shared by all processors that
//! reference it.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::process::ProcessRef;

#[derive(Default, Clone)]
pub struct ProcessRegistry {
    processes: BTreeMap<String, ProcessRef>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process under its own name, replacing any previous entry
    pub fn register(&mut self, process: ProcessRef) {
        let name = process.borrow().name().to_string();
        if self.processes.insert(name.clone(), process).is_some() {
            log::warn!("Process '{}' registered twice; keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<ProcessRef> {
        self.processes.get(name).map(Rc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processes.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.processes.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}
