//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/inspector-harness/`
//! - macOS: `~/Library/Application Support/inspector-harness/`
//! - Windows: `%APPDATA%\inspector-harness\`

use std::path::PathBuf;

/// Application name used for config directories
const APP_NAME: &str = "inspector-harness";

/// Environment variable that overrides the configuration file location
pub const CONFIG_ENV: &str = "INSPECTOR_HARNESS_CONFIG";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
///
/// `INSPECTOR_HARNESS_CONFIG` wins over the platform default.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    config_dir().map(|dir| dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_toml() {
        if std::env::var_os(CONFIG_ENV).is_some() {
            return;
        }
        if let Some(path) = config_path() {
            assert_eq!(path.file_name().unwrap(), "config.toml");
        }
    }
}
