use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::buffer::AutoGrow;
use crate::errors::{CollectorError, Result};

/// Default name of the configuration file looked up in a project directory.
pub const CONFIG_FILENAME: &str = "areacollect.toml";

/// Configuration for a collector run.
///
/// Controls which relations are assembled, the buffer sizes and the output
/// flush threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Values of the `type` tag that mark a relation as an area relation.
    pub relation_types: Vec<String>,
    /// Initial capacity of the output buffer in bytes.
    pub initial_output_buffer_size: usize,
    /// Committed output size above which the output buffer is flushed.
    pub flush_threshold: usize,
    /// Initial capacity of the buffer holding matched member ways.
    pub initial_member_buffer_size: usize,
    /// Initial capacity of the buffer holding kept relations.
    pub initial_relation_buffer_size: usize,
    /// Whether buffers may grow past their initial capacity.
    pub auto_grow: AutoGrow,
    /// Number of completed relations between two purges of the member
    /// buffer. Zero disables purging.
    pub purge_interval: usize,
    /// A way needs strictly more nodes than this to form an area on its own.
    pub min_ring_nodes: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            relation_types: vec!["multipolygon".to_string(), "boundary".to_string()],
            initial_output_buffer_size: 1024 * 1024,
            flush_threshold: 100 * 1024,
            initial_member_buffer_size: 1024 * 1024,
            initial_relation_buffer_size: 1024 * 1024,
            auto_grow: AutoGrow::Yes,
            purge_interval: 10_000,
            min_ring_nodes: 3,
        }
    }
}

impl CollectorConfig {
    /// Checks that the configuration is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.relation_types.is_empty() {
            return Err(CollectorError::Config {
                message: "relation_types must not be empty".to_string(),
            });
        }
        if self.flush_threshold >= self.initial_output_buffer_size {
            return Err(CollectorError::Config {
                message: format!(
                    "flush_threshold ({}) must be smaller than initial_output_buffer_size ({})",
                    self.flush_threshold, self.initial_output_buffer_size
                ),
            });
        }
        Ok(())
    }

    /// Whether `value` is one of the configured relation types.
    pub fn is_area_relation_type(&self, value: &str) -> bool {
        self.relation_types.iter().any(|t| t == value)
    }
}

/// Returns the path of the configuration file inside `dir`.
pub fn get_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILENAME)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Loads a configuration file. Files ending in `.json` are parsed as JSON,
/// everything else as TOML. A missing file yields the default configuration.
pub fn load_config(path: &Path) -> Result<CollectorConfig> {
    if !path.exists() {
        return Ok(CollectorConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(|e| CollectorError::Config {
        message: format!("failed to read config file '{}': {}", path.display(), e),
    })?;

    let config: CollectorConfig = if is_json(path) {
        serde_json::from_str(&contents).map_err(|e| CollectorError::Config {
            message: format!("failed to parse config file '{}': {}", path.display(), e),
        })?
    } else {
        toml::from_str(&contents)?
    };

    config.validate()?;
    Ok(config)
}

/// Saves the configuration using an atomic write.
///
/// Writes to a temporary file first and then renames it to the final location.
pub fn save_config(path: &Path, config: &CollectorConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CollectorError::Config {
                message: format!(
                    "failed to create config directory '{}': {}",
                    parent.display(),
                    e
                ),
            })?;
        }
    }

    let contents = if is_json(path) {
        serde_json::to_string_pretty(config).map_err(|e| CollectorError::Config {
            message: format!("failed to serialize config: {}", e),
        })?
    } else {
        toml::to_string_pretty(config).map_err(|e| CollectorError::Config {
            message: format!("failed to serialize config: {}", e),
        })?
    };

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &contents).map_err(|e| CollectorError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, path).map_err(|e| CollectorError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            path.display(),
            e
        ),
    })?;

    Ok(())
}
