use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Full configuration for one fusion run.
///
/// Extensions are organised in named groups (e.g. "code", "docs"); a run
/// selects a subset of groups. The union of *all* groups is the superset used
/// to classify leftover files during discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    pub root_dir: PathBuf,
    pub output_dir: PathBuf,
    pub project_name: String,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub extension_groups: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub include_groups: Vec<String>,
    #[serde(default = "default_true")]
    pub recurse: bool,
    #[serde(default = "default_true")]
    pub use_gitignore: bool,
    #[serde(default = "default_true")]
    pub use_fuseignore: bool,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_true() -> bool {
    true
}

fn default_output_file() -> String {
    "fusion.txt".to_string()
}

fn default_log_file() -> String {
    "fusion.log".to_string()
}

impl FusionConfig {
    /// Extensions of the selected groups, leading dot enforced, first
    /// occurrence wins on duplicates.
    pub fn selected_extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for group in &self.include_groups {
            if let Some(exts) = self.extension_groups.get(group) {
                for ext in exts {
                    let normalized = normalize_extension(ext);
                    if !out.contains(&normalized) {
                        out.push(normalized);
                    }
                }
            }
        }
        out
    }

    /// Extensions of *all* configured groups, selected or not.
    pub fn superset_extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for exts in self.extension_groups.values() {
            for ext in exts {
                let normalized = normalize_extension(ext);
                if !out.contains(&normalized) {
                    out.push(normalized);
                }
            }
        }
        out
    }

    pub fn trace_loaded(&self) {
        info!(
            root_dir = %self.root_dir.display(),
            output_dir = %self.output_dir.display(),
            project = %self.project_name,
            groups = self.include_groups.len(),
            recurse = self.recurse,
            "Loaded FusionConfig"
        );
        debug!(config = ?self, "FusionConfig loaded (full debug)");
    }
}

/// Normalize an extension string to carry exactly one leading dot.
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.');
    format!(".{trimmed}")
}
