use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use which::which;

use crate::{CapsuleError, Result};

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Directory where the capsule file and snapshots are stored
    pub data_dir: PathBuf,

    /// Base URL of the remote capsule service; when set, persistence goes
    /// over HTTP instead of the local file
    pub api_url: Option<String>,

    /// Default editor command for composing messages
    pub editor_command: Option<String>,

    /// Whether to snapshot the capsule file before rewriting it
    pub auto_backup: bool,

    /// Maximum number of snapshots to keep (0 keeps all)
    pub max_backups: u32,

    /// Where this configuration was loaded from; `None` means defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            api_url: None,
            editor_command: None,
            auto_backup: true,
            max_backups: 5,
            source: None,
        }
    }
}

impl Config {
    /// Loads the configuration from the given path, or from the platform
    /// config dir when none is given. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::default_path(),
        };

        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(&path)?;
        let mut config: Config =
            serde_json::from_str(&raw).map_err(|e| CapsuleError::ConfigError {
                message: format!("Failed to parse {}: {}", path.display(), e),
            })?;
        config.source = Some(path.clone());

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// The platform-default location of the config file.
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = ProjectDirs::from("", "", "timecaps") {
            dirs.config_dir().join("config.json")
        } else {
            fallback_home().join("config.json")
        }
    }

    /// Path of the capsule collection file.
    pub fn capsule_file(&self) -> PathBuf {
        self.data_dir.join("capsules.json")
    }

    /// Directory where pre-rewrite snapshots are kept.
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    // This method provides smart fallbacks when no editor is configured
    pub fn get_editor_command(&self) -> String {
        // First try the configured editor
        if let Some(editor) = &self.editor_command {
            return editor.clone();
        }

        // Then try environment variable
        if let Ok(editor) = std::env::var("EDITOR") {
            return editor;
        }

        // Fall back to platform defaults
        if cfg!(windows) {
            "notepad".to_string()
        } else if cfg!(target_os = "macos") {
            "open -t".to_string()
        } else {
            // Try common Linux editors
            for editor in &["nano", "vim", "vi", "emacs"] {
                if which(editor).is_ok() {
                    return editor.to_string();
                }
            }
            "nano".to_string()
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", "timecaps") {
        dirs.data_dir().to_path_buf()
    } else {
        fallback_home()
    }
}

fn fallback_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".timecaps")
}
