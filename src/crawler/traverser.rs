//! Walks a project tree and collects Java sources and XML mapping candidates.

use crate::error::{AuditorError, Result};
use crate::models::{SourceFile, SourceKind};
use std::path::Path;
use tracing::{debug, info, warn};

/// Traverses a project directory honoring `.gitignore` and configured patterns.
pub struct RepoTraverser {
    ignore_builder: ignore::gitignore::GitignoreBuilder,
    max_file_size: u64,
}

impl RepoTraverser {
    /// Create a new traverser rooted at `root`.
    pub fn new(root: &Path) -> Self {
        let mut ignore_builder = ignore::gitignore::GitignoreBuilder::new(root);

        let gitignore_path = root.join(".gitignore");
        if gitignore_path.exists() {
            if let Some(e) = ignore_builder.add(&gitignore_path) {
                debug!("Ignoring unreadable .gitignore: {}", e);
            }
        }

        let _ = ignore_builder.add_line(None, "**/.git/");

        Self {
            ignore_builder,
            max_file_size: 2 * 1024 * 1024,
        }
    }

    /// Set maximum file size.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Add custom ignore pattern.
    pub fn add_ignore_pattern(&mut self, pattern: &str) {
        let _ = self.ignore_builder.add_line(None, pattern);
    }

    /// Collect every Java and XML file under `root`, sorted by relative path.
    ///
    /// Fails only when the root itself cannot be read.
    pub fn get_source_files(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let metadata = std::fs::metadata(root).map_err(|source| AuditorError::ProjectRoot {
            path: root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(AuditorError::NotADirectory(root.to_path_buf()));
        }
        std::fs::read_dir(root).map_err(|source| AuditorError::ProjectRoot {
            path: root.to_path_buf(),
            source,
        })?;

        let gitignore = self
            .ignore_builder
            .build()
            .map_err(|e| AuditorError::Config(format!("Failed to build ignore rules: {}", e)))?;

        let mut files = Vec::new();

        for entry in walkdir::WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                let relative = e.path().strip_prefix(root).unwrap_or(e.path());
                relative.as_os_str().is_empty()
                    || !gitignore
                        .matched_path_or_any_parents(relative, e.file_type().is_dir())
                        .is_ignore()
            })
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(
                        "Skipping unreadable entry {}: {}",
                        err.path().map(|p| p.display().to_string()).unwrap_or_default(),
                        err
                    );
                    None
                }
            })
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();

            let kind = SourceKind::from_path(path);
            if !kind.is_supported() {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > self.max_file_size {
                debug!("Skipping large file: {}", path.display());
                continue;
            }

            files.push(SourceFile {
                path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
                absolute_path: path.to_path_buf(),
                kind,
                size,
                content: None,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));

        info!("Found {} source files in {}", files.len(), root.display());
        Ok(files)
    }
}
