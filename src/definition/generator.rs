//! ProcessorGenerator - builds processors from definition files
//!
//! Generation runs in two phases. Files are first parsed and flattened along
//! their inheritance chain into a single `DefinitionFile`. Every name is then
//! resolved against the process registry and the definition's own
//! sub-processors; if anything fails to resolve, the whole load fails with
//! the complete list and no processor is returned.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{LoadError, UnresolvedReference};
use super::file::{DefinitionFile, GLOBAL_SOURCE};
use crate::engine::{ProcessRef, ProcessRegistry, Processor, SignalRegistry, shared};

/// Extension of definition files inside a definition set
const DEFINITION_EXT: &str = "yml";

/// Prefix marking fragments that are only referenced by other definitions
const FRAGMENT_PREFIX: char = '_';

pub struct ProcessorGenerator<'a> {
    root: PathBuf,
    redirects: HashMap<PathBuf, PathBuf>,
    registry: &'a ProcessRegistry,
    signals: &'a mut SignalRegistry,
}

impl<'a> ProcessorGenerator<'a> {
    /// Generator resolving definition paths against `root`
    pub fn new(root: impl Into<PathBuf>, registry: &'a ProcessRegistry, signals: &'a mut SignalRegistry) -> Self {
        Self {
            root: root.into(),
            redirects: HashMap::new(),
            registry,
            signals,
        }
    }

    /// Add path substitutions; later entries replace earlier ones
    pub fn with_redirects<I, P, Q>(mut self, redirects: I) -> Self
    where
        I: IntoIterator<Item = (P, Q)>,
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        self.redirects
            .extend(redirects.into_iter().map(|(from, to)| (from.into(), to.into())));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generate the processor for one definition file, named after its stem
    pub fn generate(&mut self, path: impl AsRef<Path>) -> Result<Processor, LoadError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let processor = self.build(path, &name, &mut Vec::new())?;
        log::info!(
            "Generated processor '{}' from {} ({} transitions)",
            name,
            path.display(),
            processor.transition_count()
        );
        Ok(processor)
    }

    /// Generate one processor per `<kind>.yml` in the `logic` subdirectory.
    ///
    /// Files starting with `_` are fragments and are skipped.
    pub fn generate_set(&mut self, logic: &str) -> Result<BTreeMap<String, Processor>, LoadError> {
        let dir = self.root.join(logic);
        let entries = fs::read_dir(&dir).map_err(|source| LoadError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut kinds = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Io {
                path: dir.clone(),
                source,
            })?;
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some(DEFINITION_EXT) {
                continue;
            }
            let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with(FRAGMENT_PREFIX) {
                continue;
            }
            kinds.push(stem.to_string());
        }
        kinds.sort();

        let mut processors = BTreeMap::new();
        for kind in kinds {
            let relative = Path::new(logic).join(format!("{}.{}", kind, DEFINITION_EXT));
            let processor = self.generate(&relative)?;
            processors.insert(kind, processor);
        }
        Ok(processors)
    }

    fn redirect(&self, path: &Path) -> PathBuf {
        match self.redirects.get(path) {
            Some(target) => {
                log::debug!("Definition {} redirected to {}", path.display(), target.display());
                target.clone()
            }
            None => path.to_path_buf(),
        }
    }

    fn read(&self, path: &Path) -> Result<DefinitionFile, LoadError> {
        let full = self.root.join(path);
        let content = fs::read_to_string(&full).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        DefinitionFile::from_yaml(&content).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse `path` and fold its inheritance chain into one definition
    fn flatten(&self, path: &Path, stack: &mut Vec<PathBuf>) -> Result<DefinitionFile, LoadError> {
        let path = self.redirect(path);
        if stack.contains(&path) {
            return Err(LoadError::InheritanceCycle(path));
        }

        let def = self.read(&path)?;
        let Some(parent) = def.inherit.clone() else {
            return Ok(def);
        };

        stack.push(path);
        let parent = self.flatten(&parent, stack);
        stack.pop();
        Ok(def.overlay(parent?))
    }

    fn build(&mut self, path: &Path, name: &str, stack: &mut Vec<PathBuf>) -> Result<Processor, LoadError> {
        // The stack also holds every enclosing definition, so a sub-processor
        // that includes its own parent is reported as a cycle
        let def = self.flatten(path, &mut stack.clone())?;
        let identity = self.redirect(path);

        // Sub-processors first; transitions may name them
        stack.push(identity.clone());
        let mut locals: HashMap<String, ProcessRef> = HashMap::new();
        for (local, sub_path) in &def.sub_processors {
            if self.registry.contains(local) {
                log::warn!(
                    "{}: sub-processor '{}' is shadowed by the registered process of the same name",
                    identity.display(),
                    local
                );
            }
            let sub = self.build(sub_path, local, stack)?;
            locals.insert(local.clone(), shared(sub));
        }
        stack.pop();

        let resolve = |name: &str| self.registry.get(name).or_else(|| locals.get(name).cloned());
        let mut unresolved = Vec::new();

        let Some(initial_name) = def.initial_process.as_deref() else {
            log::error!("{}: no initial process", identity.display());
            return Err(LoadError::MissingInitial(identity));
        };
        let initial = resolve(initial_name);
        if initial.is_none() {
            unresolved.push(UnresolvedReference::Initial(initial_name.to_string()));
        }

        let mut resolved = Vec::new();
        for (process, signals) in &def.transitions {
            let source = if process == GLOBAL_SOURCE {
                Some(None)
            } else {
                match resolve(process) {
                    Some(p) => Some(Some(p)),
                    None => {
                        unresolved.push(UnresolvedReference::Source(process.clone()));
                        None
                    }
                }
            };

            for (signal, destination) in signals {
                let signal_id = self.signals.lookup_qualified(signal);
                if signal_id.is_none() {
                    unresolved.push(UnresolvedReference::Signal {
                        process: process.clone(),
                        signal: signal.clone(),
                    });
                }
                let dest = resolve(destination);
                if dest.is_none() {
                    unresolved.push(UnresolvedReference::Destination {
                        process: process.clone(),
                        signal: signal.clone(),
                        destination: destination.clone(),
                    });
                }
                if let (Some(source), Some(signal_id), Some(dest)) = (&source, signal_id, dest) {
                    resolved.push((source.clone(), signal_id, dest));
                }
            }
        }

        let initial = match initial {
            Some(initial) if unresolved.is_empty() => initial,
            _ => {
                log::error!(
                    "{}: {} unresolved reference(s)",
                    identity.display(),
                    unresolved.len()
                );
                return Err(LoadError::Unresolved {
                    definition: identity,
                    references: unresolved,
                });
            }
        };

        let mut processor = Processor::new(self.signals, name);
        processor.set_initial(&initial);
        for (source, signal, dest) in &resolved {
            processor.add_transition(source.as_ref(), *signal, dest);
        }
        for sub in locals.values() {
            processor.add_process(sub);
        }
        log::debug!(
            "Built processor '{}' from {}: initial '{}', {} processes",
            name,
            identity.display(),
            initial_name,
            processor.process_names().len()
        );
        Ok(processor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Process;
    use crate::engine::processor::probe::Probe;
    use tempfile::TempDir;

    struct Setup {
        dir: TempDir,
        signals: SignalRegistry,
        registry: ProcessRegistry,
    }

    fn setup() -> Setup {
        let mut signals = SignalRegistry::new();
        let mut registry = ProcessRegistry::new();
        for (name, owned) in [
            ("wait", &["GO", "FADEOUT"][..]),
            ("progress", &["FADEIN"][..]),
            ("fade_out", &["COMPLETE"][..]),
            ("fade_in", &["COMPLETE"][..]),
        ] {
            let probe = Probe::shared(&mut signals, name);
            for signal in owned {
                probe.borrow_mut().signal(&mut signals, signal);
            }
            registry.register(probe);
        }
        signals.shared("FADE_OUT");
        Setup {
            dir: TempDir::new().unwrap(),
            signals,
            registry,
        }
    }

    fn write(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn unresolved(err: LoadError) -> Vec<UnresolvedReference> {
        match err {
            LoadError::Unresolved { references, .. } => references,
            other => panic!("expected unresolved references, got {:?}", other),
        }
    }

    #[test]
    fn test_generate_simple() {
        let mut s = setup();
        write(
            &s.dir,
            "std/progress.yml",
            "initial_process: wait\ntransitions:\n  wait:\n    wait.GO: progress\n",
        );

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        let processor = generator.generate("std/progress.yml").unwrap();
        let go = s.signals.lookup("wait", "GO").unwrap();

        assert_eq!(processor.name(), "progress");
        assert_eq!(processor.initial_name(), Some("wait"));
        assert_eq!(processor.destination("wait", go), Some("progress"));
    }

    #[test]
    fn test_inheritance_override_and_addition() {
        let mut s = setup();
        write(
            &s.dir,
            "std/_base.yml",
            r#"
initial_process: wait
transitions:
  wait:
    wait.GO: progress
  progress:
    progress.FADEIN: fade_in
"#,
        );
        write(
            &s.dir,
            "std/child.yml",
            r#"
inherit: std/_base.yml
transitions:
  wait:
    wait.GO: fade_out
  fade_out:
    fade_out.COMPLETE: wait
"#,
        );

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        let processor = generator.generate("std/child.yml").unwrap();
        let sig = |owner, name| s.signals.lookup(owner, name).unwrap();

        assert_eq!(processor.initial_name(), Some("wait"));
        assert_eq!(processor.destination("wait", sig("wait", "GO")), Some("fade_out"));
        assert_eq!(processor.destination("progress", sig("progress", "FADEIN")), Some("fade_in"));
        assert_eq!(processor.destination("fade_out", sig("fade_out", "COMPLETE")), Some("wait"));
        assert_eq!(processor.transition_count(), 3);
    }

    #[test]
    fn test_unknown_source_fails() {
        let mut s = setup();
        write(
            &s.dir,
            "a.yml",
            "initial_process: wait\ntransitions:\n  nope:\n    wait.GO: progress\n",
        );

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        let refs = unresolved(generator.generate("a.yml").unwrap_err());
        assert_eq!(refs, vec![UnresolvedReference::Source("nope".to_string())]);
    }

    #[test]
    fn test_unknown_signal_fails() {
        let mut s = setup();
        write(
            &s.dir,
            "a.yml",
            "initial_process: wait\ntransitions:\n  wait:\n    wait.NOPE: progress\n",
        );

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        let refs = unresolved(generator.generate("a.yml").unwrap_err());
        assert_eq!(
            refs,
            vec![UnresolvedReference::Signal {
                process: "wait".to_string(),
                signal: "wait.NOPE".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_destination_fails() {
        let mut s = setup();
        write(
            &s.dir,
            "a.yml",
            "initial_process: wait\ntransitions:\n  wait:\n    wait.GO: nowhere\n",
        );

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        let refs = unresolved(generator.generate("a.yml").unwrap_err());
        assert!(matches!(
            &refs[..],
            [UnresolvedReference::Destination { destination, .. }] if destination == "nowhere"
        ));
    }

    #[test]
    fn test_all_unresolved_references_reported() {
        let mut s = setup();
        write(
            &s.dir,
            "a.yml",
            "initial_process: ghost\ntransitions:\n  nope:\n    wait.NOPE: nowhere\n",
        );

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        assert_eq!(unresolved(generator.generate("a.yml").unwrap_err()).len(), 4);
    }

    #[test]
    fn test_missing_initial() {
        let mut s = setup();
        write(&s.dir, "a.yml", "transitions: {}\n");

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        assert!(matches!(
            generator.generate("a.yml"),
            Err(LoadError::MissingInitial(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let mut s = setup();
        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        assert!(matches!(generator.generate("missing.yml"), Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_inheritance_cycle() {
        let mut s = setup();
        write(&s.dir, "a.yml", "initial_process: wait\ninherit: b.yml\n");
        write(&s.dir, "b.yml", "inherit: a.yml\n");

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        assert!(matches!(
            generator.generate("a.yml"),
            Err(LoadError::InheritanceCycle(_))
        ));
    }

    #[test]
    fn test_sub_processor_cycle() {
        let mut s = setup();
        write(&s.dir, "a.yml", "initial_process: inner\nsub_processors:\n  inner: a.yml\n");

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        assert!(matches!(
            generator.generate("a.yml"),
            Err(LoadError::InheritanceCycle(_))
        ));
    }

    #[test]
    fn test_sub_processor_resolves_locally() {
        let mut s = setup();
        write(
            &s.dir,
            "_inner.yml",
            "initial_process: fade_out\ntransitions:\n  fade_out:\n    fade_out.COMPLETE: fade_in\n",
        );
        write(
            &s.dir,
            "outer.yml",
            r#"
initial_process: wait
sub_processors:
  handler: _inner.yml
transitions:
  wait:
    wait.GO: handler
  handler:
    fade_in.COMPLETE: wait
"#,
        );

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        let processor = generator.generate("outer.yml").unwrap();
        let go = s.signals.lookup("wait", "GO").unwrap();
        let done = s.signals.lookup("fade_in", "COMPLETE").unwrap();

        assert_eq!(processor.destination("wait", go), Some("handler"));
        assert_eq!(processor.destination("handler", done), Some("wait"));
    }

    #[test]
    fn test_global_transition() {
        let mut s = setup();
        write(
            &s.dir,
            "a.yml",
            r#"
initial_process: wait
transitions:
  "*":
    shared.FADE_OUT: fade_out
  wait:
    wait.GO: progress
"#,
        );

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        let processor = generator.generate("a.yml").unwrap();
        let fade = s.signals.lookup("shared", "FADE_OUT").unwrap();

        assert_eq!(processor.destination("wait", fade), Some("fade_out"));
        assert_eq!(processor.destination("progress", fade), Some("fade_out"));
    }

    #[test]
    fn test_redirect_checked_before_open() {
        let mut s = setup();
        write(&s.dir, "fast.yml", "initial_process: progress\n");

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals)
            .with_redirects([("slow.yml", "fast.yml")]);
        let processor = generator.generate("slow.yml").unwrap();
        assert_eq!(processor.initial_name(), Some("progress"));
    }

    #[test]
    fn test_generate_set_skips_fragments() {
        let mut s = setup();
        write(&s.dir, "std/_base.yml", "initial_process: wait\n");
        write(&s.dir, "std/progress.yml", "inherit: std/_base.yml\n");
        write(&s.dir, "std/camera.yml", "initial_process: progress\n");
        write(&s.dir, "std/notes.txt", "ignored");

        let mut generator = ProcessorGenerator::new(s.dir.path(), &s.registry, &mut s.signals);
        let set = generator.generate_set("std").unwrap();
        assert_eq!(set.keys().map(String::as_str).collect::<Vec<_>>(), vec!["camera", "progress"]);
        assert_eq!(set["progress"].initial_name(), Some("wait"));
    }
}
