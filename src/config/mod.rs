//! Configuration system for splitwatch.
//!
//! Settings are read once at startup from YAML; definition files and routes
//! are separate documents loaded by their own modules.

use eyre::Result;
use std::path::PathBuf;

pub use self::global::{
    CameraConfig, CorrectionSettings, DefinitionsConfig, FadeConfig, FrameRates, GeneralConfig, ProcessTimings,
    RegionConfig, Settings, ThresholdConfig, TimerConfig,
};

mod global;

/// Load settings from the standard search paths.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. splitwatch.yml in current directory (project config)
/// 3. ~/.config/splitwatch/splitwatch.yml (user config)
/// 4. Default values
pub fn load_settings(explicit_path: Option<&PathBuf>) -> Result<Settings> {
    Settings::load(explicit_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("splitwatch.yml");
        std::fs::write(&path, "general:\n  default-fps: 20.0\n").unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.general.default_fps, 20.0);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/splitwatch.yml");
        assert!(load_settings(Some(&path)).is_err());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("splitwatch.yml");
        std::fs::write(&path, "thresholds:\n  black: 4.0\n").unwrap();
        assert!(load_settings(Some(&path)).is_err());
    }
}
