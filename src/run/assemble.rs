//! Building the processor switch for a route

use crate::config::Settings;
use crate::definition::ProcessorGenerator;
use crate::engine::{ProcessorSwitch, SignalRegistry};
use crate::error::Result;
use crate::processes::standard_registry;
use crate::route::Route;

/// Generate one processor per definition in the route's definition set.
///
/// Route redirects are applied on top of the configured ones. Any definition
/// that fails to resolve fails the whole switch.
pub fn assemble_switch(settings: &Settings, route: &Route) -> Result<ProcessorSwitch> {
    let mut signals = SignalRegistry::new();
    let registry = standard_registry(&mut signals, settings);

    let mut generator = ProcessorGenerator::new(&settings.definitions.dir, &registry, &mut signals)
        .with_redirects(settings.definitions.redirects.clone())
        .with_redirects(route.redirects.clone());
    let processors = generator.generate_set(&route.logic)?;

    for kind in route.kinds() {
        if !processors.contains_key(kind) {
            log::warn!(
                "Route '{}' uses checkpoint kind '{}' but definition set '{}' has no {}.yml",
                route.title,
                kind,
                route.logic,
                kind
            );
        }
    }

    let mut switch = ProcessorSwitch::new();
    for (kind, processor) in processors {
        switch.register(kind, processor);
    }
    log::info!("Processor switch ready for definition set '{}'", route.logic);
    Ok(switch)
}
