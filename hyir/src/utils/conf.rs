//! Configuration for contexts and modules.
//!
//! ```toml
//! [context]
//! md_kinds = ["dbg", "tbaa", "prof"]
//!
//! [module]
//! data_layout = "e-m:e-p:64:64-i64:64-n8:16:32:64-S128"
//! ```
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    magic::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, ENV_CONFIG_PATH},
    utils::error::{Error, HyResult},
};

/// Settings applied when creating a [`Context`](crate::context::Context).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Metadata kinds registered up front, in order. The first one receives id 0.
    pub md_kinds: Vec<String>,
}

/// Settings applied when creating a [`Module`](crate::module::Module).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Layout descriptor installed on new modules. `None` keeps the unspecified layout.
    pub data_layout: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyirConfig {
    pub context: ContextConfig,
    pub module: ModuleConfig,
}

impl HyirConfig {
    /// Get the default path to the configuration file.
    pub fn default_path() -> PathBuf {
        if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
            return config_path.into();
        }

        let mut path = PathBuf::new();

        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                path.push(appdata);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
                path.push(xdg_config_home);
            } else if let Ok(home) = std::env::var("HOME") {
                path.push(home);
                path.push(".config");
            }
        }

        path.push(CONFIG_DIR_NAME);
        path.push(CONFIG_FILE_NAME);
        path
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(toml_str: &str) -> HyResult<Self> {
        toml::from_str(toml_str).map_err(|e| Error::ConfigParse {
            source: e,
            file: "<memory>".to_string(),
        })
    }

    /// Load a configuration from a TOML file.
    pub fn load_from_toml(path: &Path) -> HyResult<Self> {
        let toml_str = std::fs::read_to_string(path)?;

        toml::from_str(&toml_str).map_err(|e| Error::ConfigParse {
            source: e,
            file: path.display().to_string(),
        })
    }

    /// Load the configuration at [`Self::default_path`], falling back to the
    /// default configuration when the file does not exist.
    pub fn load_or_default() -> HyResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from_toml(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save_to_toml(&self, path: &Path) -> HyResult<()> {
        let toml_str = toml::to_string(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
