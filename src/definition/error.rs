//! Definition loading errors

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A name in a definition that resolved to nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReference {
    /// `initial_process` names no known process
    Initial(String),
    /// A `transitions` key names no known process
    Source(String),
    /// A signal key is not a registered `owner.SIGNAL`
    Signal { process: String, signal: String },
    /// A destination names no known process
    Destination {
        process: String,
        signal: String,
        destination: String,
    },
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReference::Initial(name) => write!(f, "initial process '{}'", name),
            UnresolvedReference::Source(name) => write!(f, "process '{}'", name),
            UnresolvedReference::Signal { process, signal } => {
                write!(f, "signal '{}' (from '{}')", signal, process)
            }
            UnresolvedReference::Destination {
                process,
                signal,
                destination,
            } => write!(f, "destination '{}' (from '{}' on '{}')", destination, process, signal),
        }
    }
}

fn join(references: &[UnresolvedReference]) -> String {
    references
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot read definition {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse definition {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Definition inheritance cycle through {0}")]
    InheritanceCycle(PathBuf),

    #[error("Definition {definition} has unresolved references: {}", join(.references))]
    Unresolved {
        definition: PathBuf,
        references: Vec<UnresolvedReference>,
    },

    #[error("Definition {0} declares no initial process")]
    MissingInitial(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_lists_every_reference() {
        let err = LoadError::Unresolved {
            definition: PathBuf::from("standard/progress.yml"),
            references: vec![
                UnresolvedReference::Source("wiat".to_string()),
                UnresolvedReference::Signal {
                    process: "wait".to_string(),
                    signal: "wait.FADEINN".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Definition standard/progress.yml has unresolved references: process 'wiat', signal 'wait.FADEINN' (from 'wait')"
        );
    }

    #[test]
    fn test_cycle_message() {
        let err = LoadError::InheritanceCycle(PathBuf::from("a.yml"));
        assert_eq!(err.to_string(), "Definition inheritance cycle through a.yml");
    }
}
