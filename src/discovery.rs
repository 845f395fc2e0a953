//! # discovery: Candidate file discovery and partitioning
//!
//! Expands the project root into a candidate list via the storage adapter and
//! partitions it into files matching the requested extensions and leftover
//! files outside the configured extension superset. Exclusion is delegated to
//! the [`ExclusionSet`]; ordering of either partition is unspecified and is
//! imposed later by the assembler.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, info};

use crate::config::normalize_extension;
use crate::ignore_rules::ExclusionSet;
use crate::storage::{Storage, StorageError};

/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Non-excluded paths with a requested extension; these get processed.
    pub matched: Vec<String>,
    /// Non-excluded paths whose extension lies outside the full configured
    /// superset; reported in the log, never processed.
    pub other: Vec<String>,
}

/// Discover candidate files under `root`.
///
/// `extensions` are the requested (selected plus plugin-contributed)
/// extensions; `superset` is the union of every configured group. Both are
/// normalized to a leading dot before matching. One glob set is built per
/// call: `*.<ext>` at root level, `**/*.<ext>` when recursing.
pub async fn discover(
    root: &Path,
    extensions: &[String],
    superset: &[String],
    recurse: bool,
    exclusion: &ExclusionSet,
    storage: &dyn Storage,
) -> Result<Discovered, StorageError> {
    let requested = build_extension_globs(extensions, recurse)?;
    let superset: Vec<String> = superset.iter().map(|e| normalize_extension(e)).collect();

    let candidates = storage.list_files(root, recurse).await?;
    debug!(candidates = candidates.len(), root = %root.display(), "Raw discovery candidates");

    let mut discovered = Discovered::default();
    for rel in candidates {
        if exclusion.is_excluded(&rel, false) {
            debug!(path = %rel, "Excluded by ignore rules");
            continue;
        }
        if requested.is_match(&rel) {
            discovered.matched.push(rel);
        } else if !superset.contains(&extension_of(&rel)) {
            discovered.other.push(rel);
        }
    }

    info!(
        matched = discovered.matched.len(),
        other = discovered.other.len(),
        "Discovery completed"
    );
    Ok(discovered)
}

fn build_extension_globs(extensions: &[String], recurse: bool) -> Result<GlobSet, StorageError> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        let ext = normalize_extension(ext);
        let pattern = if recurse {
            format!("**/*{ext}")
        } else {
            format!("*{ext}")
        };
        // literal_separator keeps `*` from crossing directory boundaries, so
        // the non-recursive pattern stays confined to the root level.
        builder.add(GlobBuilder::new(&pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

/// Dot-prefixed extension of a slash-normalized relative path, or an empty
/// string when there is none.
fn extension_of(rel: &str) -> String {
    match Path::new(rel).extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    }
}
