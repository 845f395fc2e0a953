//! # plugin: Ordered, fault-isolated hook pipeline
//!
//! This module defines the capability interface third parties implement
//! ([`Plugin`]) and the registry that owns registrations ([`PluginRegistry`]).
//!
//! ## Execution model
//! - Hooks run in plugin registration order (first registered, first run),
//!   skipping plugins whose enabled flag is off.
//! - Every hook invocation sits behind a fault boundary: a hook returning an
//!   error is logged and treated as an identity pass-through, so one
//!   misbehaving plugin can never abort the run.
//! - `before_file_processing` may veto a file by returning `None`; no later
//!   plugin in the chain sees a vetoed file.
//! - Output strategies and extra file extensions contributed by plugins are
//!   unioned; conflicting strategy keys resolve last-registered-wins.
//!
//! ## Lifecycle
//! `initialize` runs for every enabled plugin before any file hook fires;
//! `cleanup` runs for every enabled plugin after the run completes, success
//! or failure, best-effort and independent per plugin.
//!
//! ## Mocking & Testing
//! The trait is annotated for `mockall` so tests can generate deterministic
//! plugin mocks.

use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{normalize_extension, FusionConfig};
use crate::fuse::{FileRecord, OutputStrategy};
use crate::run::RunReport;

/// Error type for plugin callbacks (simple boxed error for now).
pub type PluginError = Box<dyn std::error::Error + Send + Sync>;

/// Identity of a plugin. A non-empty name is mandatory at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Capability interface for extensions. Every callback except [`metadata`]
/// is optional: the defaults are identity pass-throughs.
///
/// [`metadata`]: Plugin::metadata
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Identity of this plugin; absence of a name is a hard load error.
    fn metadata(&self) -> PluginMetadata;

    /// Invoked once before any file hook fires.
    async fn initialize(&self, _config: &FusionConfig) -> Result<(), PluginError> {
        Ok(())
    }

    /// Invoked once after the run completes, success or failure.
    async fn cleanup(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once per discovered file before it joins the working set.
    /// Return `None` to drop the file from the run.
    async fn before_file_processing(
        &self,
        record: FileRecord,
        _config: &FusionConfig,
    ) -> Result<Option<FileRecord>, PluginError> {
        Ok(Some(record))
    }

    /// Called once per surviving file; receives the content produced by the
    /// previous plugin in the chain and returns the content for the next.
    async fn after_file_processing(
        &self,
        _record: &FileRecord,
        content: String,
        _config: &FusionConfig,
    ) -> Result<String, PluginError> {
        Ok(content)
    }

    /// Called once per run with the full candidate set; may reorder, filter
    /// or override configuration before aggregation.
    async fn before_fusion(
        &self,
        config: FusionConfig,
        records: Vec<FileRecord>,
    ) -> Result<(FusionConfig, Vec<FileRecord>), PluginError> {
        Ok((config, records))
    }

    /// Called once per run on the finished report; may augment or replace it.
    async fn after_fusion(
        &self,
        report: RunReport,
        _config: &FusionConfig,
    ) -> Result<RunReport, PluginError> {
        Ok(report)
    }

    /// Named output-format strategies contributed by this plugin.
    fn output_strategies(&self) -> HashMap<String, OutputStrategy> {
        HashMap::new()
    }

    /// Extra recognized file extensions contributed by this plugin.
    fn file_extensions(&self) -> Vec<String> {
        Vec::new()
    }
}

struct Registered {
    plugin: Box<dyn Plugin>,
    enabled: bool,
}

/// Owns plugin registrations for one or more runs.
///
/// Deliberately *not* ambient global state: callers that want process-wide
/// behaviour construct one registry, hold the reference, and pass it into
/// each run. A run borrows the registry read-only except for calling into
/// plugin code.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Registered>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin at the end of the chain. Fails hard when the
    /// metadata name is empty or already taken.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        let metadata = plugin.metadata();
        if metadata.name.trim().is_empty() {
            return Err("plugin metadata must carry a non-empty name".into());
        }
        if self.plugins.iter().any(|r| r.plugin.metadata().name == metadata.name) {
            return Err(format!("plugin '{}' is already registered", metadata.name).into());
        }
        info!(
            plugin = %metadata.name,
            version = %metadata.version,
            "Registered plugin"
        );
        self.plugins.push(Registered {
            plugin,
            enabled: true,
        });
        Ok(())
    }

    /// Enable or disable a plugin without forgetting its chain position.
    /// Returns false when no plugin carries that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        for registered in &mut self.plugins {
            if registered.plugin.metadata().name == name {
                registered.enabled = enabled;
                info!(plugin = name, enabled, "Changed plugin enabled flag");
                return true;
            }
        }
        false
    }

    /// Remove a plugin from the chain. Returns false when absent.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins
            .retain(|r| r.plugin.metadata().name != name);
        let removed = self.plugins.len() != before;
        if removed {
            info!(plugin = name, "Unregistered plugin");
        }
        removed
    }

    /// Registered plugin names in chain order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins
            .iter()
            .map(|r| r.plugin.metadata().name)
            .collect()
    }

    fn enabled(&self) -> impl Iterator<Item = &Registered> {
        self.plugins.iter().filter(|r| r.enabled)
    }

    /// Union of extra extensions from every enabled plugin, normalized and
    /// deduplicated in chain order.
    pub fn extra_extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for registered in self.enabled() {
            for ext in registered.plugin.file_extensions() {
                let normalized = normalize_extension(&ext);
                if !out.contains(&normalized) {
                    out.push(normalized);
                }
            }
        }
        out
    }

    /// Merged output strategies from every enabled plugin; conflicting keys
    /// resolve in favour of the later-registered plugin.
    pub fn output_strategies(&self) -> HashMap<String, OutputStrategy> {
        let mut merged = HashMap::new();
        for registered in self.enabled() {
            for (name, strategy) in registered.plugin.output_strategies() {
                merged.insert(name, strategy);
            }
        }
        merged
    }

    /// Run `initialize` for every enabled plugin. Failures are logged and do
    /// not exclude the plugin from subsequent hooks.
    pub async fn initialize_all(&self, config: &FusionConfig) {
        for registered in self.enabled() {
            let name = registered.plugin.metadata().name;
            if let Err(e) = registered.plugin.initialize(config).await {
                error!(plugin = %name, error = ?e, "Plugin initialize failed");
            } else {
                debug!(plugin = %name, "Plugin initialized");
            }
        }
    }

    /// Run `cleanup` for every enabled plugin, best-effort and independent
    /// per plugin.
    pub async fn cleanup_all(&self) {
        for registered in self.enabled() {
            let name = registered.plugin.metadata().name;
            if let Err(e) = registered.plugin.cleanup().await {
                error!(plugin = %name, error = ?e, "Plugin cleanup failed");
            }
        }
    }

    /// Chain `before_file_processing`. `None` means some plugin vetoed the
    /// file; later plugins do not see it.
    pub async fn run_before_file(
        &self,
        record: FileRecord,
        config: &FusionConfig,
    ) -> Option<FileRecord> {
        let mut current = record;
        for registered in self.enabled() {
            let name = registered.plugin.metadata().name;
            match registered
                .plugin
                .before_file_processing(current.clone(), config)
                .await
            {
                Ok(Some(next)) => current = next,
                Ok(None) => {
                    info!(plugin = %name, path = %current.path, "Plugin dropped file");
                    return None;
                }
                Err(e) => {
                    warn!(plugin = %name, path = %current.path, error = ?e,
                        "before_file_processing hook failed; passing record through unchanged");
                }
            }
        }
        Some(current)
    }

    /// Chain `after_file_processing`, threading the evolving content through
    /// every enabled plugin in order.
    pub async fn run_after_file(
        &self,
        record: &FileRecord,
        content: String,
        config: &FusionConfig,
    ) -> String {
        let mut current = content;
        for registered in self.enabled() {
            let name = registered.plugin.metadata().name;
            match registered
                .plugin
                .after_file_processing(record, current.clone(), config)
                .await
            {
                Ok(next) => current = next,
                Err(e) => {
                    warn!(plugin = %name, path = %record.path, error = ?e,
                        "after_file_processing hook failed; carrying content through unchanged");
                }
            }
        }
        current
    }

    /// Chain `before_fusion` across the full candidate set.
    pub async fn run_before_fusion(
        &self,
        config: FusionConfig,
        records: Vec<FileRecord>,
    ) -> (FusionConfig, Vec<FileRecord>) {
        let mut current = (config, records);
        for registered in self.enabled() {
            let name = registered.plugin.metadata().name;
            match registered
                .plugin
                .before_fusion(current.0.clone(), current.1.clone())
                .await
            {
                Ok(next) => current = next,
                Err(e) => {
                    warn!(plugin = %name, error = ?e,
                        "before_fusion hook failed; carrying candidate set through unchanged");
                }
            }
        }
        current
    }

    /// Chain `after_fusion` on the finished report.
    pub async fn run_after_fusion(
        &self,
        report: RunReport,
        config: &FusionConfig,
    ) -> RunReport {
        let mut current = report;
        for registered in self.enabled() {
            let name = registered.plugin.metadata().name;
            match registered
                .plugin
                .after_fusion(current.clone(), config)
                .await
            {
                Ok(next) => current = next,
                Err(e) => {
                    warn!(plugin = %name, error = ?e,
                        "after_fusion hook failed; carrying report through unchanged");
                }
            }
        }
        current
    }
}
