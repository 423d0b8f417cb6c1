use crate::error::{AuditError, Result};
use regex::RegexSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tracing::{debug, warn};

/// Async discovery of the pages of a site
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// File extensions to include (e.g., ["html", "htm"])
    extensions: Vec<String>,
    /// Exclude patterns, matched against the root-relative path
    exclude_set: Option<RegexSet>,
}

#[derive(Default)]
struct WalkState {
    files: Vec<PathBuf>,
    errors: usize,
}

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

impl FileDiscovery {
    /// Create a new FileDiscovery instance
    pub fn new() -> Self {
        Self {
            extensions: vec!["html".to_string()],
            exclude_set: None,
        }
    }

    /// Set file extensions to discover
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Add exclude patterns (regex syntax)
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        if patterns.is_empty() {
            self.exclude_set = None;
            return Ok(self);
        }

        self.exclude_set = Some(RegexSet::new(&patterns).map_err(|e| {
            AuditError::Config(format!("Invalid exclude pattern: {}", e))
        })?);
        Ok(self)
    }

    /// Discover pages under `root`, returned relative to it and sorted.
    pub async fn discover_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.walk(root).await?.files)
    }

    async fn walk(&self, root: &Path) -> Result<WalkState> {
        let metadata = fs::metadata(root).await?;
        if !metadata.is_dir() {
            return Err(AuditError::FileSystemTraversal {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut state = WalkState::default();
        self.walk_directory(root, root, &mut state).await?;
        state.files.sort();

        debug!(
            "Discovered {} file(s) under {} ({} error(s))",
            state.files.len(),
            root.display(),
            state.errors
        );
        Ok(state)
    }

    /// Recursive helper for discovering files
    fn walk_directory<'a>(
        &'a self,
        root: &'a Path,
        dir: &'a Path,
        state: &'a mut WalkState,
    ) -> WalkFuture<'a> {
        Box::pin(async move {
            let mut read_dir = fs::read_dir(dir).await?;

            while let Some(entry) = read_dir.next_entry().await? {
                let entry_path = entry.path();

                // Symbolic links are never followed
                if entry_path.is_symlink() {
                    continue;
                }

                let metadata = match fs::metadata(&entry_path).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!("Skipping {}: {}", entry_path.display(), e);
                        state.errors += 1;
                        continue;
                    }
                };

                if metadata.is_dir() {
                    if let Err(e) = self.walk_directory(root, &entry_path, state).await {
                        // Log error but continue processing other directories
                        warn!("Error processing {}: {}", entry_path.display(), e);
                        state.errors += 1;
                    }
                } else if metadata.is_file() {
                    let relative = entry_path
                        .strip_prefix(root)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| entry_path.clone());
                    if self.should_process(&relative) {
                        state.files.push(relative);
                    }
                }
            }

            Ok(())
        })
    }

    /// Check if a root-relative path should be processed based on extension and excludes
    pub fn should_process(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&extension.to_lowercase()) {
            return false;
        }

        if let Some(exclude_set) = &self.exclude_set {
            let normalized = path.to_string_lossy().replace('\\', "/");
            if exclude_set.is_match(&normalized) {
                return false;
            }
        }

        true
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}
