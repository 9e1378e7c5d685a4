//! Local configuration directory resolution
//!
//! Location: `$ZED_CONFIG_DIR` when set, otherwise the platform config
//! directory (`~/.config/zed` on Linux, `~/Library/Application Support/zed`
//! on macOS, `%APPDATA%\zed` on Windows), falling back to `~/.zed`.

use std::path::PathBuf;

use crate::env::{ReadEnv, CONFIG_DIR_VAR};

/// Name of the directory created under the platform config directory
const APP_DIR_NAME: &str = "zed";

/// Dot-directory used when the platform has no config directory
const HOME_DIR_NAME: &str = ".zed";

/// Get the zed configuration directory
pub fn config_dir<E: ReadEnv>(env: &E) -> Option<PathBuf> {
    if let Ok(dir) = env.var(CONFIG_DIR_VAR) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir));
        }
    }

    if let Some(dir) = dirs::config_dir() {
        return Some(dir.join(APP_DIR_NAME));
    }

    dirs::home_dir().map(|home| home.join(HOME_DIR_NAME))
}
