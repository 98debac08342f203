//! Route file loading
//!
//! Routes are YAML documents; files with a `.json` extension are read as JSON.

use std::fs;
use std::path::Path;

use super::Route;
use crate::error::{Result, SplitError};

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Load and validate a route file
pub fn load_route<P: AsRef<Path>>(path: P) -> Result<Route> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| SplitError::Route(format!("Failed to read route {}: {}", path.display(), e)))?;

    let route: Route = if is_json(path) {
        serde_json::from_str(&content)
            .map_err(|e| SplitError::Route(format!("Failed to parse route {}: {}", path.display(), e)))?
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| SplitError::Route(format!("Failed to parse route {}: {}", path.display(), e)))?
    };

    route
        .validate()
        .map_err(|e| SplitError::Route(format!("{}: {}", path.display(), e)))?;

    log::info!(
        "Loaded route '{}' ({} splits, logic '{}') from {}",
        route.title,
        route.len(),
        route.logic,
        path.display()
    );
    Ok(route)
}

/// Write a route file in the format implied by its extension
pub fn save_route<P: AsRef<Path>>(route: &Route, path: P) -> Result<()> {
    let path = path.as_ref();
    let content = if is_json(path) {
        serde_json::to_string_pretty(route)?
    } else {
        serde_yaml::to_string(route)?
    };
    fs::write(path, content)?;
    Ok(())
}
