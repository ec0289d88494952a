//! Path resolution for keel
//!
//! # Environment Variables
//!
//! - `KEEL_CONFIG_DIR` - Override config directory (fallback manifest location)
//! - `KEEL_STATE_DIR` - Override state directory (catalog location)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `KEEL_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/keel` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\keel`
//!    - macOS/Linux: `~/.config/keel`
//!
//! For state_dir():
//! 1. `KEEL_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/keel` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\keel`
//!    - macOS/Linux: `~/.local/state/keel`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "KEEL_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "KEEL_STATE_DIR";

/// Manifest file name, in the working directory or the config directory
pub const MANIFEST_FILE: &str = "keel.toml";

/// Catalog file name inside the state directory
pub const CATALOG_FILE: &str = "catalog.json";

/// Get the keel config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("keel");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join("keel"));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("keel"))
}

/// Get the keel state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("keel");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return Ok(local_app_data.join("keel"));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join("keel"))
}

/// Locate the manifest
///
/// An explicit path wins. Otherwise `keel.toml` in the working directory,
/// then `keel.toml` in the config directory.
pub fn manifest_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand(&path.to_string_lossy()));
    }

    let local = PathBuf::from(MANIFEST_FILE);
    if local.exists() {
        return Ok(local);
    }

    Ok(config_dir()?.join(MANIFEST_FILE))
}

/// Locate the catalog file; an explicit path wins over the state directory
pub fn catalog_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(expand(&path.to_string_lossy())),
        None => Ok(state_dir()?.join(CATALOG_FILE)),
    }
}

/// Expand ~ and environment variables in a path string
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    /// Tests that touch the process environment take this lock
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with `key` set to `value` (or removed), restoring it afterwards
    fn with_env<F, R>(key: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: env mutation is serialized by ENV_LOCK
        match value {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        with_env(ENV_CONFIG_DIR, Some("/custom/config/path"), || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/config/path"));
        });
    }

    #[test]
    fn test_state_dir_env_override_with_tilde() {
        let _guard = ENV_LOCK.lock().unwrap();
        let home = dirs::home_dir().unwrap();
        with_env(ENV_STATE_DIR, Some("~/keel-state-test"), || {
            assert_eq!(state_dir().unwrap(), home.join("keel-state-test"));
        });
    }

    #[test]
    fn test_xdg_state_home() {
        let _guard = ENV_LOCK.lock().unwrap();
        with_env(ENV_STATE_DIR, None, || {
            with_env("XDG_STATE_HOME", Some("/tmp/xdg-state-test"), || {
                assert_eq!(
                    state_dir().unwrap(),
                    PathBuf::from("/tmp/xdg-state-test/keel")
                );
            });
        });
    }

    #[test]
    fn test_catalog_path() {
        let _guard = ENV_LOCK.lock().unwrap();
        assert_eq!(
            catalog_path(Some(Path::new("/tmp/my.json"))).unwrap(),
            PathBuf::from("/tmp/my.json")
        );
        with_env(ENV_STATE_DIR, Some("/var/keel"), || {
            assert_eq!(
                catalog_path(None).unwrap(),
                PathBuf::from("/var/keel/catalog.json")
            );
        });
    }

    #[test]
    fn test_explicit_manifest_path_is_expanded() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(
            manifest_path(Some(Path::new("~/infra/keel.toml"))).unwrap(),
            home.join("infra").join("keel.toml")
        );
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
