//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + voice commands):
//!   Windows: %APPDATA%\push-to-type\
//!   macOS:   ~/Library/Application Support/push-to-type/
//!   Linux:   ~/.config/push-to-type/
//!
//! Data dir (models):
//!   Windows: %LOCALAPPDATA%\push-to-type\
//!   macOS:   ~/Library/Application Support/push-to-type/
//!   Linux:   ~/.local/share/push-to-type/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `commands.json`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to `commands.json` (voice command table).
    pub commands_file: PathBuf,
    /// Directory for downloaded GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "push-to-type";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let commands_file = config_dir.join("commands.json");
        let models_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            commands_file,
            models_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
