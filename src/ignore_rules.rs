//! # ignore_rules: Layered exclusion predicate over relative paths
//!
//! Builds one [`ExclusionSet`] per run from up to three pattern sources:
//! the project's `.gitignore`, the tool-specific `.fuseignore`, and a
//! compiled-in default set that stands in when `.fuseignore` is enabled but
//! absent. Pattern semantics (comments, `!` negation, directory vs. file
//! matching) come from the `ignore` crate's gitignore engine.
//!
//! After construction the predicate is a pure function of the relative path;
//! nothing here touches the file system again.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

use crate::config::FusionConfig;
use crate::storage::{resolve_relative, Storage, StorageError};

/// Name of the tool-specific ignore file looked up in the project root.
pub const FUSE_IGNORE_FILE: &str = ".fuseignore";

/// Patterns substituted when `.fuseignore` is enabled but missing.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git/",
    "node_modules/",
    "target/",
    "dist/",
    "build/",
    "*.log",
    ".DS_Store",
];

/// Composed exclusion predicate, built once per run.
pub struct ExclusionSet {
    matcher: Gitignore,
    warnings: Vec<String>,
}

impl ExclusionSet {
    /// Load and merge all enabled ignore sources under `root`.
    ///
    /// Malformed pattern lines are skipped by the underlying matcher; a
    /// missing `.gitignore` is silent, a missing `.fuseignore` falls back to
    /// [`DEFAULT_IGNORE_PATTERNS`] with a recorded warning.
    pub async fn build(
        root: &Path,
        config: &FusionConfig,
        storage: &dyn Storage,
    ) -> Result<ExclusionSet, StorageError> {
        let mut builder = GitignoreBuilder::new(root);
        let mut warnings = Vec::new();

        if config.use_gitignore {
            let gitignore_path = resolve_relative(root, ".gitignore");
            if storage.exists(&gitignore_path).await {
                let content = storage.read_to_string(&gitignore_path).await?;
                add_patterns(&mut builder, &content);
                debug!(path = %gitignore_path.display(), "Merged .gitignore patterns");
            }
        }

        if config.use_fuseignore {
            let fuseignore_path = resolve_relative(root, FUSE_IGNORE_FILE);
            if storage.exists(&fuseignore_path).await {
                let content = storage.read_to_string(&fuseignore_path).await?;
                add_patterns(&mut builder, &content);
                debug!(path = %fuseignore_path.display(), "Merged .fuseignore patterns");
            } else {
                let message = format!(
                    "{FUSE_IGNORE_FILE} not found in {}; using built-in default ignore patterns",
                    root.display()
                );
                warn!(root = %root.display(), "{message}");
                warnings.push(message);
                for pattern in DEFAULT_IGNORE_PATTERNS {
                    add_patterns(&mut builder, pattern);
                }
            }
        }

        let matcher = builder.build()?;
        Ok(ExclusionSet { matcher, warnings })
    }

    /// Whether a root-relative, slash-normalized path is excluded.
    ///
    /// Deterministic and side-effect-free; identical inputs always yield
    /// identical answers within a run.
    pub fn is_excluded(&self, relative_path: &str, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }

    /// Non-fatal warnings collected while loading pattern sources.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Feed pattern lines into the builder, skipping lines it rejects.
fn add_patterns(builder: &mut GitignoreBuilder, content: &str) {
    for line in content.lines() {
        if builder.add_line(None, line).is_err() {
            debug!(pattern = line, "Skipping malformed ignore pattern");
        }
    }
}
