//! Platform directory resolution.
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | Config | `~/.config/qa-search/` | `~/Library/Application Support/qa-search/` |
//! | Cache | `~/.cache/qa-search/` | `~/Library/Caches/qa-search/` |

use std::path::PathBuf;

/// Application name used in directory paths
const APP_NAME: &str = "qa-search";

/// Directory searched for `settings.json` when `--config` is not given.
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| fallback_base_dir().join("config"))
}

pub fn get_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| fallback_base_dir().join("cache"))
}

/// Where downloaded embedding models are kept.
pub fn get_model_cache_dir() -> PathBuf {
    get_cache_dir().join("models")
}

/// Default settings file location.
pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

fn fallback_base_dir() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".qa-search"))
        .unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".qa-search")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_cache_dir_under_app_dir() {
        let dir = get_model_cache_dir();
        assert!(dir.ends_with("models"));
        assert!(dir.to_string_lossy().contains("qa-search"));
    }

    #[test]
    fn test_settings_path_is_json() {
        let path = get_settings_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("settings.json"));
    }
}
