use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::procfs::PipeMatcher;

/// Tool configuration loaded from ~/.config/pipepeer/config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub pipe: PipeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Mount point of the process introspection filesystem.
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
    /// Print each matched descriptor path before its PID.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            proc_root: default_proc_root(),
            verbose: false,
        }
    }
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

/// Naming convention of pipe-backed descriptor targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            suffix: default_suffix(),
        }
    }
}

fn default_prefix() -> String {
    "pipe:[".to_string()
}

fn default_suffix() -> String {
    "]".to_string()
}

impl Config {
    /// Load config from the default path, or return defaults if not found.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load config from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        Ok(config)
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pipepeer").join("config.toml"))
}

/// Immutable run settings, built once from config plus CLI overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub proc_root: PathBuf,
    pub verbose: bool,
    pub matcher: PipeMatcher,
}

impl Settings {
    pub fn from_config(config: Config) -> Self {
        // An empty prefix would classify every descriptor as a pipe.
        let pipe = if config.pipe.prefix.is_empty() {
            log::warn!("empty pipe.prefix in config, using default pipe naming");
            PipeConfig::default()
        } else {
            config.pipe
        };
        Self {
            proc_root: config.general.proc_root,
            verbose: config.general.verbose,
            matcher: PipeMatcher::new(pipe.prefix, pipe.suffix),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(Config::default())
    }
}
