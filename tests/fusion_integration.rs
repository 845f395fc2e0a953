use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tempfile::tempdir;

use repofuse::config::FusionConfig;
use repofuse::fuse::{self, FileRecord};
use repofuse::plugin::PluginRegistry;
use repofuse::run::run_fusion;
use repofuse::storage::LocalStorage;

/// Minimal config over a temp root: one "code" group with .js, gitignore on,
/// tool ignore off so the run sees exactly the files the test created.
fn test_config(root: &Path, out: &Path) -> FusionConfig {
    let mut extension_groups = HashMap::new();
    extension_groups.insert("code".to_string(), vec!["js".to_string()]);
    FusionConfig {
        root_dir: root.to_path_buf(),
        output_dir: out.to_path_buf(),
        project_name: "fixture".to_string(),
        package_name: String::new(),
        extension_groups,
        include_groups: vec!["code".to_string()],
        recurse: true,
        use_gitignore: true,
        use_fuseignore: false,
        output_file: "fusion.txt".to_string(),
        log_file: "fusion.log".to_string(),
    }
}

#[tokio::test]
async fn fuses_two_files_in_sorted_order_with_fingerprints() {
    let root = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(root.path().join("b.js"), "2").unwrap();
    fs::write(root.path().join("a.js"), "1").unwrap();

    let config = test_config(root.path(), out.path());
    let registry = PluginRegistry::new();
    let storage = LocalStorage::new();

    let report = run_fusion(&config, &registry, &storage).await;
    assert!(report.success, "report: {report:?}");

    let artifact = fs::read_to_string(report.artifact_path.expect("artifact path")).unwrap();
    assert!(artifact.contains("# Files: 2"));

    let a_pos = artifact.find("### a.js").expect("a.js section");
    let b_pos = artifact.find("### b.js").expect("b.js section");
    assert!(a_pos < b_pos, "entries must be sorted by path");

    // Fingerprints reflect the raw content as read from storage.
    assert!(artifact.contains(&format!("# Hash: {}", fuse::fingerprint(b"1"))));
    assert!(artifact.contains(&format!("# Hash: {}", fuse::fingerprint(b"2"))));
}

#[tokio::test]
async fn gitignore_excludes_a_file_from_the_artifact() {
    let root = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(root.path().join("a.js"), "1").unwrap();
    fs::write(root.path().join("b.js"), "2").unwrap();
    fs::write(root.path().join(".gitignore"), "b.js\n").unwrap();

    let config = test_config(root.path(), out.path());
    let registry = PluginRegistry::new();
    let storage = LocalStorage::new();

    let report = run_fusion(&config, &registry, &storage).await;
    assert!(report.success, "report: {report:?}");

    let artifact = fs::read_to_string(report.artifact_path.unwrap()).unwrap();
    assert!(artifact.contains("# Files: 1"));
    assert!(artifact.contains("### a.js"));
    assert!(!artifact.contains("### b.js"));
}

#[tokio::test]
async fn zero_configured_extensions_fails_before_any_io() {
    let root = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(root.path().join("a.js"), "1").unwrap();

    let mut config = test_config(root.path(), out.path());
    config.include_groups.clear();
    let registry = PluginRegistry::new();
    let storage = LocalStorage::new();

    let report = run_fusion(&config, &registry, &storage).await;
    assert!(!report.success);
    assert!(report.message.contains("nothing to process"));
    assert!(report.artifact_path.is_none());
    assert!(!out.path().join("fusion.txt").exists());
    // Not even the log is created for a pure configuration error.
    assert!(!out.path().join("fusion.log").exists());
}

#[tokio::test]
async fn zero_discovered_files_fails_with_distinct_message() {
    let root = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(root.path().join("readme.md"), "not js").unwrap();

    let config = test_config(root.path(), out.path());
    let registry = PluginRegistry::new();
    let storage = LocalStorage::new();

    let report = run_fusion(&config, &registry, &storage).await;
    assert!(!report.success);
    assert!(report.message.contains("No files found"));
    assert!(!out.path().join("fusion.txt").exists());
    // The log was started and records the outcome.
    let log = fs::read_to_string(out.path().join("fusion.log")).unwrap();
    assert!(log.contains("No files found to fuse"));
}

#[tokio::test]
async fn run_log_is_truncated_and_accounts_for_every_file() {
    let root = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(root.path().join("a.js"), "1").unwrap();
    fs::write(root.path().join("notes.xyz"), "leftover").unwrap();

    let config = test_config(root.path(), out.path());
    let registry = PluginRegistry::new();
    let storage = LocalStorage::new();

    fs::write(out.path().join("fusion.log"), "stale line from a previous run\n").unwrap();

    let report = run_fusion(&config, &registry, &storage).await;
    assert!(report.success);

    let log = fs::read_to_string(report.log_path.unwrap()).unwrap();
    assert!(!log.contains("stale line"), "log must be truncated at run start");
    assert!(log.contains("Run started"));
    assert!(log.contains("Discovered: a.js"));
    assert!(log.contains("Processed: a.js"));
    assert!(log.contains("Skipped (extension not configured): notes.xyz"));
    assert!(log.contains("Artifact written:"));
}

#[tokio::test]
async fn missing_root_directory_yields_failure_report() {
    let root = tempdir().unwrap();
    let missing = root.path().join("does-not-exist");
    let out = tempdir().unwrap();

    let config = test_config(&missing, out.path());
    let registry = PluginRegistry::new();
    let storage = LocalStorage::new();

    let report = run_fusion(&config, &registry, &storage).await;
    assert!(!report.success);
    assert!(report.message.contains("Root directory"));
    assert!(report.error.is_some());
}

#[test]
fn serialization_is_idempotent_for_a_fixed_record_set() {
    use chrono::TimeZone;

    let records = vec![
        FileRecord {
            path: "a.js".to_string(),
            content: "1".to_string(),
            fingerprint: fuse::fingerprint(b"1"),
        },
        FileRecord {
            path: "b.js".to_string(),
            content: "2".to_string(),
            fingerprint: fuse::fingerprint(b"2"),
        },
    ];
    let generated_at = chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let strategy = fuse::default_strategy();

    let first = fuse::serialize(&records, "fixture", "", generated_at, &strategy);
    let second = fuse::serialize(&records, "fixture", "", generated_at, &strategy);
    assert_eq!(first, second, "same inputs must serialize byte-for-byte equal");
}

#[test]
fn header_prefers_combined_label_only_when_names_differ() {
    use chrono::TimeZone;

    let generated_at = chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let strategy = fuse::default_strategy();

    let same = fuse::serialize(&[], "Fusion", "fusion", generated_at, &strategy);
    assert!(same.contains("# Project: Fusion\n"));

    let different = fuse::serialize(&[], "Fusion", "core", generated_at, &strategy);
    assert!(different.contains("# Project: Fusion / core\n"));
}
