//! High-level pipeline: orchestrates discovery → hooks → assembly → write.
//!
//! This module provides the top-level orchestration logic for one fusion run
//! as described in the loaded config. It implements a coordinated pipeline
//! that:
//!   - Builds the layered exclusion predicate and discovers candidate files
//!   - Threads every file through the plugin hook chain (registration order,
//!     fault-isolated)
//!   - Reads, fingerprints, sorts and serializes the survivors into the
//!     artifact, with an append-only audit log on the side
//!   - Returns a [`RunReport`] for every outcome; nothing escapes as a panic.
//!
//! # Error Handling
//! Configuration errors (no extensions) and discovery errors (no files)
//! surface as unsuccessful reports before/without processing. Per-file read
//! errors and plugin failures are logged and skipped. Anything fatal (output
//! directory, artifact write) is caught once, logged when a log path is
//! resolvable, and carried in the report. Nothing is retried.
//!
//! # Navigation
//! - Main entrypoint: [`run_fusion`]
//! - Supporting type: [`RunReport`].

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::FusionConfig;
use crate::discovery;
use crate::fuse::{self, FileRecord, RunLog};
use crate::ignore_rules::ExclusionSet;
use crate::plugin::PluginRegistry;
use crate::storage::Storage;

/// Structured result of one run, returned to the caller and never retried
/// internally.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub message: String,
    pub artifact_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl RunReport {
    fn failure(message: impl Into<String>, error: Option<String>, log_path: Option<PathBuf>) -> Self {
        RunReport {
            success: false,
            message: message.into(),
            artifact_path: None,
            log_path,
            error,
        }
    }
}

/// Entrypoint: run the whole fusion pipeline once.
///
/// The registry is borrowed read-only except for calling into plugin code;
/// callers that want "register once, run many times" hold the registry
/// themselves.
pub async fn run_fusion(
    config: &FusionConfig,
    registry: &PluginRegistry,
    storage: &dyn Storage,
) -> RunReport {
    info!(project = %config.project_name, "[FUSE] Starting fusion run");

    // Configuration errors fail fast, before any file I/O or plugin
    // lifecycle.
    let mut extensions = config.selected_extensions();
    for ext in registry.extra_extensions() {
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    if extensions.is_empty() {
        error!("[FUSE] No file extensions configured");
        return RunReport::failure(
            "No file extensions configured; nothing to process",
            None,
            None,
        );
    }

    registry.initialize_all(config).await;
    let report = execute_run(config, registry, storage, &extensions).await;
    let report = registry.run_after_fusion(report, config).await;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => debug!(json = %json, "[FUSE] Final run report"),
        Err(e) => error!(error = ?e, "[FUSE] Failed to serialize run report"),
    }
    registry.cleanup_all().await;
    report
}

async fn execute_run(
    config: &FusionConfig,
    registry: &PluginRegistry,
    storage: &dyn Storage,
    extensions: &[String],
) -> RunReport {
    if let Err(e) = storage.create_dir_all(&config.output_dir).await {
        error!(dir = %config.output_dir.display(), error = ?e, "[FUSE] Failed to create output directory");
        return RunReport::failure(
            format!("Failed to create output directory {}", config.output_dir.display()),
            Some(e.to_string()),
            None,
        );
    }

    let log = RunLog::start(storage, config.output_dir.join(&config.log_file)).await;
    let log_path = log.path().to_path_buf();

    match storage.stat(&config.root_dir).await {
        Ok(stat) if stat.is_dir => {}
        Ok(_) => {
            error!(root = %config.root_dir.display(), "[FUSE] Root path is not a directory");
            log.line(&format!(
                "Fatal: root path is not a directory: {}",
                config.root_dir.display()
            ))
            .await;
            return RunReport::failure("Root path is not a directory", None, Some(log_path));
        }
        Err(e) => {
            error!(root = %config.root_dir.display(), error = ?e, "[FUSE] Root directory not accessible");
            log.line(&format!(
                "Fatal: root directory not accessible: {}: {e}",
                config.root_dir.display()
            ))
            .await;
            return RunReport::failure(
                "Root directory not accessible",
                Some(e.to_string()),
                Some(log_path),
            );
        }
    }

    let exclusion = match ExclusionSet::build(&config.root_dir, config, storage).await {
        Ok(exclusion) => exclusion,
        Err(e) => {
            error!(error = ?e, "[FUSE] Failed to build ignore rules");
            log.line(&format!("Fatal: failed to build ignore rules: {e}"))
                .await;
            return RunReport::failure(
                "Failed to build ignore rules",
                Some(e.to_string()),
                Some(log_path),
            );
        }
    };
    for warning in exclusion.warnings() {
        log.line(&format!("Warning: {warning}")).await;
    }

    let discovered = match discovery::discover(
        &config.root_dir,
        extensions,
        &config.superset_extensions(),
        config.recurse,
        &exclusion,
        storage,
    )
    .await
    {
        Ok(discovered) => discovered,
        Err(e) => {
            error!(error = ?e, "[FUSE] Discovery failed");
            log.line(&format!("Fatal: discovery failed: {e}")).await;
            return RunReport::failure("Discovery failed", Some(e.to_string()), Some(log_path));
        }
    };

    for path in &discovered.matched {
        log.line(&format!("Discovered: {path}")).await;
    }
    for path in &discovered.other {
        log.line(&format!("Skipped (extension not configured): {path}"))
            .await;
    }

    if discovered.matched.is_empty() {
        info!("[FUSE] No files found to fuse");
        log.line("No files found to fuse").await;
        return RunReport::failure("No files found to fuse", None, Some(log_path));
    }

    // Read and fingerprint before the per-file hooks: the fingerprint always
    // reflects content as read from storage.
    let records = fuse::assemble(&discovered.matched, &config.root_dir, storage, &log).await;

    let mut surviving: Vec<FileRecord> = Vec::with_capacity(records.len());
    for record in records {
        let path = record.path.clone();
        match registry.run_before_file(record, config).await {
            Some(record) => surviving.push(record),
            None => log.line(&format!("Dropped by plugin: {path}")).await,
        }
    }

    let (effective_config, records) = registry
        .run_before_fusion(config.clone(), surviving)
        .await;

    // A before_fusion hook may redirect the output directory; the artifact
    // write below targets the effective one, so make sure it exists too.
    if effective_config.output_dir != config.output_dir {
        if let Err(e) = storage.create_dir_all(&effective_config.output_dir).await {
            error!(dir = %effective_config.output_dir.display(), error = ?e, "[FUSE] Failed to create output directory");
            log.line(&format!(
                "Fatal: failed to create output directory {}: {e}",
                effective_config.output_dir.display()
            ))
            .await;
            return RunReport::failure(
                format!(
                    "Failed to create output directory {}",
                    effective_config.output_dir.display()
                ),
                Some(e.to_string()),
                Some(log_path),
            );
        }
    }

    let mut fused: Vec<FileRecord> = Vec::with_capacity(records.len());
    for record in records {
        let content = registry
            .run_after_file(&record, record.content.clone(), &effective_config)
            .await;
        fused.push(FileRecord { content, ..record });
    }

    fuse::sort_records(&mut fused);

    // A plugin strategy registered under "default" overrides the built-in
    // section format (last-registered plugin wins on the key).
    let strategy = registry
        .output_strategies()
        .remove("default")
        .unwrap_or_else(fuse::default_strategy);
    let artifact_text = fuse::serialize(
        &fused,
        &effective_config.project_name,
        &effective_config.package_name,
        Utc::now(),
        &strategy,
    );

    let artifact_path = effective_config
        .output_dir
        .join(&effective_config.output_file);
    match storage.write(&artifact_path, artifact_text.as_bytes()).await {
        Ok(()) => {
            log.line(&format!("Artifact written: {}", artifact_path.display()))
                .await;
            info!(
                files = fused.len(),
                artifact = %artifact_path.display(),
                "[FUSE] Fusion completed"
            );
            RunReport {
                success: true,
                message: format!(
                    "Fused {} files into {}",
                    fused.len(),
                    artifact_path.display()
                ),
                artifact_path: Some(artifact_path),
                log_path: Some(log_path),
                error: None,
            }
        }
        Err(e) => {
            error!(artifact = %artifact_path.display(), error = ?e, "[FUSE] Failed to write artifact");
            log.line(&format!("Fatal: failed to write artifact: {e}"))
                .await;
            RunReport::failure("Failed to write artifact", Some(e.to_string()), Some(log_path))
        }
    }
}
