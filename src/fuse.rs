//! # fuse: Reading, fingerprinting and serializing the surviving file set
//!
//! The assembler turns discovered paths into [`FileRecord`]s (content plus a
//! SHA-256 fingerprint over the raw bytes as read from storage), imposes the
//! total path order that makes the artifact deterministic, and renders the
//! final artifact text. It also owns the append-only run log.
//!
//! Reads are dispatched concurrently; only the sort order before
//! serialization is load-bearing for determinism.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error};

use crate::storage::{resolve_relative, Storage};

/// One surviving file, immutable once fingerprinted.
///
/// The fingerprint is computed from the content as read from storage, before
/// any hook mutation. Hooks that rewrite content deliberately do *not*
/// trigger re-fingerprinting; a hook that needs the fingerprint to track its
/// mutation must re-derive it itself.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    /// Root-relative, slash-normalized path.
    pub path: String,
    pub content: String,
    pub fingerprint: String,
}

/// Renders one record into its artifact section.
pub type OutputStrategy = Arc<dyn Fn(&FileRecord) -> String + Send + Sync>;

/// Hex SHA-256 digest of raw bytes. Deterministic: identical content yields
/// an identical fingerprint on every run.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Read and fingerprint every path, skipping unreadable files.
///
/// Reads run concurrently; the returned order follows the input order, which
/// carries no guarantee either way. Call [`sort_records`] before serializing.
pub async fn assemble(
    paths: &[String],
    root: &Path,
    storage: &dyn Storage,
    log: &RunLog<'_>,
) -> Vec<FileRecord> {
    let reads = paths.iter().map(|rel| async move {
        let abs = resolve_relative(root, rel);
        match storage.read(&abs).await {
            Ok(bytes) => {
                let record = FileRecord {
                    path: rel.clone(),
                    fingerprint: fingerprint(&bytes),
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                };
                debug!(path = %rel, size = record.content.len(), "Read and fingerprinted file");
                Ok(record)
            }
            Err(e) => Err((rel.clone(), e)),
        }
    });

    let mut records = Vec::with_capacity(paths.len());
    for result in futures::future::join_all(reads).await {
        match result {
            Ok(record) => {
                log.line(&format!("Processed: {}", record.path)).await;
                records.push(record);
            }
            Err((rel, e)) => {
                error!(path = %rel, error = ?e, "Failed to read file; skipping");
                log.line(&format!("Error reading {rel}: {e}")).await;
            }
        }
    }
    records
}

/// Total order by byte-wise path comparison. Paths are unique, so ties are
/// impossible.
pub fn sort_records(records: &mut [FileRecord]) {
    records.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
}

/// The `### path` / `# Hash:` / content triple used unless a plugin strategy
/// overrides rendering.
pub fn default_strategy() -> OutputStrategy {
    Arc::new(|record: &FileRecord| {
        format!(
            "### {}\n# Hash: {}\n\n{}",
            record.path, record.fingerprint, record.content
        )
    })
}

/// Render the full artifact: header block, then every record in the order
/// given (callers sort first). Byte-for-byte deterministic for a fixed
/// record set and timestamp.
pub fn serialize(
    records: &[FileRecord],
    project_name: &str,
    package_name: &str,
    generated_at: DateTime<Utc>,
    strategy: &OutputStrategy,
) -> String {
    let label = project_label(project_name, package_name);
    let mut out = String::new();
    out.push_str(&format!(
        "# Fused by repofuse v{}\n# Project: {}\n# Generated: {}\n# Files: {}\n",
        env!("CARGO_PKG_VERSION"),
        label,
        generated_at.to_rfc3339(),
        records.len()
    ));
    for record in records {
        out.push('\n');
        out.push_str(&strategy(record));
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Combined "project / package" label only when the two differ
/// case-insensitively.
fn project_label(project_name: &str, package_name: &str) -> String {
    if package_name.is_empty() || project_name.eq_ignore_ascii_case(package_name) {
        project_name.to_string()
    } else {
        format!("{project_name} / {package_name}")
    }
}

/// Append-only audit log, truncated and restarted at the beginning of each
/// run. Logging failures are reported through tracing and never abort a run.
pub struct RunLog<'a> {
    storage: &'a dyn Storage,
    path: PathBuf,
}

impl<'a> RunLog<'a> {
    /// Truncate any previous log and write the opening line.
    pub async fn start(storage: &'a dyn Storage, path: PathBuf) -> RunLog<'a> {
        if let Err(e) = storage.write(&path, b"").await {
            error!(path = %path.display(), error = ?e, "Failed to truncate run log");
        }
        let log = RunLog { storage, path };
        log.line("Run started").await;
        log
    }

    /// Append one timestamped line.
    pub async fn line(&self, message: &str) {
        let entry = format!("[{}] {}\n", Utc::now().to_rfc3339(), message);
        if let Err(e) = self.storage.append(&self.path, entry.as_bytes()).await {
            error!(path = %self.path.display(), error = ?e, "Failed to append to run log");
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_and_content_sensitive() {
        let a = fingerprint(b"1");
        assert_eq!(a, fingerprint(b"1"));
        assert_ne!(a, fingerprint(b"2"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn project_label_collapses_case_insensitive_duplicates() {
        assert_eq!(project_label("Fusion", "fusion"), "Fusion");
        assert_eq!(project_label("Fusion", ""), "Fusion");
        assert_eq!(project_label("Fusion", "core"), "Fusion / core");
    }

    #[test]
    fn sort_records_orders_by_byte_comparison() {
        let mut records = vec![
            FileRecord {
                path: "b.js".into(),
                content: String::new(),
                fingerprint: String::new(),
            },
            FileRecord {
                path: "a.js".into(),
                content: String::new(),
                fingerprint: String::new(),
            },
            FileRecord {
                path: "a/z.js".into(),
                content: String::new(),
                fingerprint: String::new(),
            },
        ];
        sort_records(&mut records);
        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.js", "a/z.js", "b.js"]);
    }
}
