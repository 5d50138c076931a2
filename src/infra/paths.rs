// src/infra/paths.rs — Config file location
//
// KIMI2API_HOME overrides everything. Otherwise config lives in ~/.kimi2api/,
// falling back to the platform config dir when no home directory is known.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Returns the KIMI2API_HOME override, if set.
fn kimi2api_home() -> Option<PathBuf> {
    std::env::var_os("KIMI2API_HOME").map(PathBuf::from)
}

/// Configuration directory: $KIMI2API_HOME/ or ~/.kimi2api/
pub fn config_dir() -> PathBuf {
    if let Some(home) = kimi2api_home() {
        return home;
    }
    if let Some(base) = BaseDirs::new() {
        return base.home_dir().join(".kimi2api");
    }
    ProjectDirs::from("", "", "kimi2api")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default config file path.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
