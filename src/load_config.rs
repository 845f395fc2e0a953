use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{error, info};

use crate::config::FusionConfig;

/// Loads a YAML config file and validates the group selection.
/// Returns a fully validated [`FusionConfig`] or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FusionConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: FusionConfig = match serde_yaml::from_str(&config_content) {
        Ok(config) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            config
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if config.project_name.trim().is_empty() {
        error!("project_name missing from config");
        anyhow::bail!("project_name must be set in the config file");
    }

    for group in &config.include_groups {
        if !config.extension_groups.contains_key(group) {
            error!(group = %group, "Selected extension group is not defined");
            anyhow::bail!("Unknown extension group selected: {}", group);
        }
    }

    config.trace_loaded();
    Ok(config)
}
