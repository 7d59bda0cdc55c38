use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::tools::ToolError;

/// Resolves model-supplied relative paths against a fixed sandbox root.
///
/// The root is canonicalized once at startup and never changes. Every
/// resolution canonicalizes the joined path *before* the containment
/// check, because a prefix check on the raw string is bypassable via
/// `..` segments or symlinks.
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Creates a guard for the given root directory.
    ///
    /// Fails if the directory does not exist or cannot be canonicalized.
    pub fn new(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root)
            .with_context(|| format!("Cannot canonicalize sandbox root {}", root.display()))?;
        Ok(Self { root })
    }

    /// The canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative path for reading.
    ///
    /// The target must exist (canonicalization fails otherwise) and the
    /// canonical result must be the root itself or a descendant of it.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let joined = self.root.join(relative);
        let canonical = fs::canonicalize(&joined).map_err(|_| self.denied(relative))?;

        if canonical.starts_with(&self.root) {
            Ok(canonical)
        } else {
            Err(self.denied(relative))
        }
    }

    /// Resolves a relative path for writing, creating missing parent
    /// directories.
    ///
    /// An existing target (including a symlink, which a write would
    /// follow) is canonicalized and containment-checked itself. A
    /// missing target is checked via its nearest existing ancestor
    /// before any directory is created.
    pub fn resolve_for_write(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let rel = Path::new(relative);
        if rel.is_absolute() {
            return Err(self.denied(relative));
        }

        let target = self.root.join(rel);

        // Something already sits at the final component. A symlink
        // here would redirect the write, so the check must run on the
        // canonical target, not just its parent chain. Dangling
        // symlinks fail canonicalization and are rejected too.
        if fs::symlink_metadata(&target).is_ok() {
            let canonical = fs::canonicalize(&target).map_err(|_| self.denied(relative))?;
            return if canonical.starts_with(&self.root) {
                Ok(canonical)
            } else {
                Err(self.denied(relative))
            };
        }

        let parent = target.parent().ok_or_else(|| self.denied(relative))?;

        // Walk up to the nearest ancestor that already exists; that is
        // the deepest point a symlink or `..` could redirect through.
        let mut ancestor = parent;
        while !ancestor.exists() {
            ancestor = match ancestor.parent() {
                Some(p) => p,
                None => return Err(self.denied(relative)),
            };
        }

        let canonical_ancestor =
            fs::canonicalize(ancestor).map_err(|_| self.denied(relative))?;
        if !canonical_ancestor.starts_with(&self.root) {
            return Err(self.denied(relative));
        }

        fs::create_dir_all(parent).map_err(ToolError::Io)?;

        // Re-resolve now that the full parent chain exists.
        let canonical_parent = fs::canonicalize(parent).map_err(ToolError::Io)?;
        if !canonical_parent.starts_with(&self.root) {
            return Err(self.denied(relative));
        }

        let file_name = target.file_name().ok_or_else(|| self.denied(relative))?;
        Ok(canonical_parent.join(file_name))
    }

    fn denied(&self, relative: &str) -> ToolError {
        debug!("Path rejected by sandbox: {relative}");
        ToolError::AccessDenied(relative.to_string())
    }
}
