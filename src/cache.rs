use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use moka::future::Cache;

use crate::document::Document;
use crate::error::{AuditError, Result};

/// Session-lifetime caches keyed by root-relative path.
///
/// Raw text is never invalidated during a session. Validated documents are
/// dropped on demand so a refresh re-runs validation without re-reading files.
/// Only the orchestrating task writes to either cache; workers hand their
/// results back instead.
pub struct SessionCache {
    raw_texts: Cache<PathBuf, Arc<str>>,
    documents: Cache<PathBuf, Arc<Document>>,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            raw_texts: Cache::builder().build(),
            documents: Cache::builder().build(),
        }
    }

    /// Raw text of `path`, read from `root` on first use.
    ///
    /// Concurrent callers for the same path share a single read.
    pub async fn load_raw_text(&self, root: &Path, path: &Path) -> Result<Arc<str>> {
        let full_path = root.join(path);

        self.raw_texts
            .try_get_with(path.to_path_buf(), async move {
                let bytes = tokio::fs::read(&full_path).await?;
                let text: Arc<str> = String::from_utf8_lossy(&bytes).into();
                Ok::<_, io::Error>(text)
            })
            .await
            .map_err(|e| AuditError::Io(io::Error::new(e.kind(), e.to_string())))
    }

    pub async fn document(&self, path: &Path) -> Option<Arc<Document>> {
        self.documents.get(path).await
    }

    pub async fn insert_document(&self, document: Arc<Document>) {
        self.documents.insert(document.path.clone(), document).await;
    }

    /// Forget every validated document; raw texts are kept.
    pub async fn clear_documents(&self) {
        self.documents.invalidate_all();
        self.documents.run_pending_tasks().await;
    }

    /// Get cache statistics
    pub async fn stats(&self) -> SessionCacheStats {
        // Run sync to ensure all pending operations are complete
        self.raw_texts.run_pending_tasks().await;
        self.documents.run_pending_tasks().await;

        SessionCacheStats {
            raw_text_entries: self.raw_texts.entry_count(),
            document_entries: self.documents.entry_count(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionCacheStats {
    pub raw_text_entries: u64,
    pub document_entries: u64,
}
