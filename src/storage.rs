//! # storage: Uniform interface over a real or simulated file system
//!
//! This module defines a single trait (`Storage`) and a production
//! implementation (`LocalStorage`) for every file-system touch the fusion
//! pipeline makes: reading candidates, writing the artifact, appending to the
//! run log, stat/existence checks, directory creation and file listing.
//!
//! ## Interface & Extensibility
//! - Implement the [`Storage`] trait to target other backends (in-memory,
//!   remote, test fixtures).
//! - All methods are async, returning results with boxed error types.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;

/// Error type for Storage operations (simple boxed error for now).
pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// Minimal metadata returned by [`Storage::stat`].
#[derive(Debug, Clone)]
pub struct FileStat {
    pub size: u64,
    pub is_file: bool,
    pub is_dir: bool,
}

/// Trait for all file-system access made by the pipeline.
/// Implemented by [`LocalStorage`] in production and by mocks in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the full contents of a file as raw bytes.
    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Read the full contents of a file as UTF-8 text.
    async fn read_to_string(&self, path: &Path) -> Result<String, StorageError>;

    /// Create or truncate a file with the given contents.
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError>;

    /// Append to a file, creating it if absent.
    async fn append(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError>;

    /// Stat a path.
    async fn stat(&self, path: &Path) -> Result<FileStat, StorageError>;

    /// Whether a path exists at all.
    async fn exists(&self, path: &Path) -> bool;

    /// Create a directory and all of its parents.
    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError>;

    /// List regular files under `root`, returned root-relative and
    /// slash-normalized. With `recurse = false` only the root level is
    /// listed. No ordering guarantee.
    async fn list_files(&self, root: &Path, recurse: bool) -> Result<Vec<String>, StorageError>;
}

/// Production implementation backed by the local file system.
#[derive(Debug, Default, Clone)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, StorageError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        Ok(tokio::fs::write(path, contents).await?)
    }

    async fn append(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(contents).await?;
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, StorageError> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(FileStat {
            size: meta.len(),
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
        })
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        Ok(tokio::fs::create_dir_all(path).await?)
    }

    async fn list_files(&self, root: &Path, recurse: bool) -> Result<Vec<String>, StorageError> {
        // The walk itself is synchronous; listing is a one-shot burst at the
        // start of a run and recursion through async fns would need boxing.
        fn visit_dir(
            dir: &Path,
            root: &Path,
            recurse: bool,
            results: &mut Vec<String>,
        ) -> std::io::Result<()> {
            for entry_res in std::fs::read_dir(dir)? {
                let entry = entry_res?;
                let path = entry.path();
                if path.is_dir() {
                    if recurse {
                        visit_dir(&path, root, recurse, results)?;
                    }
                } else if path.is_file() {
                    if let Ok(rel) = path.strip_prefix(root) {
                        results.push(normalize_relative(rel));
                    }
                }
            }
            Ok(())
        }

        let mut results = Vec::new();
        visit_dir(root, root, recurse, &mut results)?;
        Ok(results)
    }
}

/// Join path components with forward slashes regardless of platform.
pub fn normalize_relative(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve a slash-normalized relative path back to an absolute one.
pub fn resolve_relative(root: &Path, rel: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in rel.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}
