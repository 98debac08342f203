//! Definition file intermediate representation

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Key in `transitions` that applies to every process in the processor
pub const GLOBAL_SOURCE: &str = "*";

/// Transition table: source process → (`owner.SIGNAL` → destination process)
pub type TransitionTable = BTreeMap<String, BTreeMap<String, String>>;

/// One parsed definition file, before any name is resolved
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DefinitionFile {
    pub initial_process: Option<String>,

    /// Parent definition, relative to the definition root
    pub inherit: Option<PathBuf>,

    pub transitions: TransitionTable,

    /// Local name → nested definition path, relative to the definition root
    pub sub_processors: BTreeMap<String, PathBuf>,
}

impl DefinitionFile {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Overlay this definition on an already-flattened parent.
    ///
    /// The child's initial process and sub-processors win; transitions merge
    /// per `(process, signal)` key.
    pub fn overlay(self, parent: DefinitionFile) -> DefinitionFile {
        let mut sub_processors = parent.sub_processors;
        sub_processors.extend(self.sub_processors);

        DefinitionFile {
            initial_process: self.initial_process.or(parent.initial_process),
            inherit: None,
            transitions: merge_transitions(parent.transitions, self.transitions),
            sub_processors,
        }
    }

    /// Number of `(process, signal)` entries
    pub fn transition_count(&self) -> usize {
        self.transitions.values().map(BTreeMap::len).sum()
    }
}

/// Merge two transition tables; `local` wins on `(process, signal)` collisions
pub fn merge_transitions(parent: TransitionTable, local: TransitionTable) -> TransitionTable {
    let mut merged = parent;
    for (process, signals) in local {
        merged.entry(process).or_default().extend(signals);
    }
    merged
}
