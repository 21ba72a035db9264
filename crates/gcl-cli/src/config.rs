//! Configuration file parsing for gcl.toml.

use gcl_runtime::{GcConfig, LoopConfig, RuntimeConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Managed heap settings
    #[serde(default)]
    pub gc: GcSection,

    /// Event loop settings
    #[serde(default)]
    pub event_loop: LoopSection,

    /// Defaults for the stress command
    #[serde(default)]
    pub stress: StressSection,
}

/// Heap configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GcSection {
    /// Live bytes at which a collection is due
    pub threshold: Option<usize>,

    /// Hard limit on live objects
    pub max_objects: Option<usize>,
}

/// Event loop configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoopSection {
    /// Hard limit on open idle handles
    pub max_handles: Option<usize>,
}

/// Stress run defaults.
#[derive(Debug, Deserialize, Serialize)]
pub struct StressSection {
    /// Objects to register
    #[serde(default = "default_objects")]
    pub objects: usize,

    /// Objects per collection (0 = everything in one collection)
    #[serde(default)]
    pub batch: usize,

    /// Make every n-th callback throw (0 = never)
    #[serde(default)]
    pub throw_every: usize,
}

impl Default for StressSection {
    fn default() -> Self {
        Self {
            objects: default_objects(),
            batch: 0,
            throw_every: 0,
        }
    }
}

fn default_objects() -> usize {
    1000
}

impl Config {
    /// Runtime configuration described by this file
    pub fn runtime_config(&self) -> RuntimeConfig {
        let mut gc = match self.gc.threshold {
            Some(threshold) => GcConfig::with_threshold(threshold),
            None => GcConfig::default(),
        };
        gc.max_objects = self.gc.max_objects;

        RuntimeConfig {
            gc,
            event_loop: LoopConfig {
                max_handles: self.event_loop.max_handles,
            },
        }
    }
}

/// Load configuration from a file or search for default config files.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok().and_then(|cwd| find_config_file(&cwd)));

    match config_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(config)
        }
        Some(path) => anyhow::bail!("Config file {} does not exist", path.display()),
        None => Ok(Config::default()),
    }
}

/// Search for a configuration file in `start` and its parent directories.
fn find_config_file(start: &Path) -> Option<PathBuf> {
    const CONFIG_NAMES: &[&str] = &["gcl.toml", ".gclrc.toml"];

    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }

    None
}
