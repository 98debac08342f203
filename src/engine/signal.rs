//! Signal identifiers
//!
//! Signals are interned once at startup. Equality is identity: two signals
//! carrying the same label are different signals unless they were declared
//! in the shared scope.

use std::collections::HashMap;
use std::fmt;

/// Owner name used for explicitly shared signals, e.g. `shared.FADE_OUT`
pub const SHARED_SCOPE: &str = "shared";

/// Name of the per-process "remain active" signal
pub const LOOP_SIGNAL: &str = "LOOP";

/// Interned signal handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u32);

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who a signal belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalScope {
    /// Raised only by the named process
    Process(String),
    /// Declared once, raised by any process that chooses to
    Shared,
    /// Not addressable from definition files (processor loop signals)
    Anonymous,
}

#[derive(Debug, Clone)]
struct SignalEntry {
    scope: SignalScope,
    name: String,
}

/// Registry of every signal known to the engine
#[derive(Debug, Default)]
pub struct SignalRegistry {
    entries: Vec<SignalEntry>,
    by_key: HashMap<(String, String), SignalId>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signal owned by `owner`.
    ///
    /// Registering the same `(owner, name)` pair twice returns the first id.
    pub fn register(&mut self, owner: &str, name: &str) -> SignalId {
        let key = (owner.to_string(), name.to_string());
        if let Some(id) = self.by_key.get(&key) {
            return *id;
        }

        let scope = if owner == SHARED_SCOPE {
            SignalScope::Shared
        } else {
            SignalScope::Process(owner.to_string())
        };
        let id = self.push(scope, name);
        self.by_key.insert(key, id);
        id
    }

    /// Declare (or fetch) a shared signal
    pub fn shared(&mut self, name: &str) -> SignalId {
        self.register(SHARED_SCOPE, name)
    }

    /// Allocate a fresh signal that cannot be looked up by name
    pub fn allocate(&mut self, label: &str) -> SignalId {
        self.push(SignalScope::Anonymous, label)
    }

    /// Find a signal by owner and name
    pub fn lookup(&self, owner: &str, name: &str) -> Option<SignalId> {
        self.by_key.get(&(owner.to_string(), name.to_string())).copied()
    }

    /// Resolve a definition-file key of the form `owner.signal`
    pub fn lookup_qualified(&self, qualified: &str) -> Option<SignalId> {
        let (owner, name) = split_qualified(qualified)?;
        self.lookup(owner, name)
    }

    pub fn scope(&self, id: SignalId) -> Option<&SignalScope> {
        self.entries.get(id.0 as usize).map(|e| &e.scope)
    }

    /// Human-readable `owner.name` label for logs
    pub fn label(&self, id: SignalId) -> String {
        match self.entries.get(id.0 as usize) {
            Some(SignalEntry { scope: SignalScope::Process(owner), name }) => format!("{}.{}", owner, name),
            Some(SignalEntry { scope: SignalScope::Shared, name }) => format!("{}.{}", SHARED_SCOPE, name),
            Some(SignalEntry { scope: SignalScope::Anonymous, name }) => format!("<{}>", name),
            None => id.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, scope: SignalScope, name: &str) -> SignalId {
        let id = SignalId(self.entries.len() as u32);
        self.entries.push(SignalEntry {
            scope,
            name: name.to_string(),
        });
        id
    }
}

/// Split `owner.signal` at the last dot
pub fn split_qualified(qualified: &str) -> Option<(&str, &str)> {
    let (owner, name) = qualified.rsplit_once('.')?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner, name))
}
