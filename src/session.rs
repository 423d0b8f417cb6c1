use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::SessionCache;
use crate::document::{Document, ProblemKind, meta_author};
use crate::engine::{AuditEngine, ProgressCallback, RoundStats};
use crate::error::Result;
use crate::parser;

/// Page and problem counts for one search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub pages: usize,
    pub problems: BTreeMap<ProblemKind, usize>,
}

impl Summary {
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut summary = Summary::default();
        for document in documents {
            summary.pages += 1;
            for problem in &document.problems {
                *summary.problems.entry(problem.kind).or_default() += 1;
            }
        }
        summary
    }

    pub fn count(&self, kind: ProblemKind) -> usize {
        self.problems.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_problems(&self) -> usize {
        self.problems.values().sum()
    }
}

/// Everything one search produced
#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub documents: BTreeMap<PathBuf, Arc<Document>>,
    pub summary: Summary,
    /// The refresh keyword was given and validated documents were dropped
    pub refreshed: bool,
    pub stats: RoundStats,
}

/// Lowercased keywords of a search, and whether the refresh keyword was among them.
pub fn parse_keywords(input: &str, refresh_keyword: &str) -> (Vec<String>, bool) {
    let refresh_keyword = refresh_keyword.to_lowercase();
    let mut refresh = false;

    let keywords = input
        .to_lowercase()
        .split_whitespace()
        .filter(|word| {
            if *word == refresh_keyword {
                refresh = true;
                false
            } else {
                true
            }
        })
        .map(str::to_string)
        .collect();

    (keywords, refresh)
}

/// A site opened for repeated searches.
///
/// Caches live as long as the session; only the refresh keyword drops
/// validated documents.
pub struct Session {
    root: PathBuf,
    files: Vec<PathBuf>,
    cache: SessionCache,
    engine: AuditEngine,
    refresh_keyword: String,
}

impl Session {
    pub fn new(
        root: impl Into<PathBuf>,
        files: Vec<PathBuf>,
        engine: AuditEngine,
        refresh_keyword: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            files,
            cache: SessionCache::new(),
            engine,
            refresh_keyword: refresh_keyword.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discovered pages, relative to the root
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub async fn search(&self, input: &str) -> Result<SearchReport> {
        self.search_with_progress(input, None).await
    }

    /// Audit every page whose path or author contains one of the keywords.
    ///
    /// An empty search selects every page.
    pub async fn search_with_progress(
        &self,
        input: &str,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<SearchReport> {
        let (keywords, refresh) = parse_keywords(input, &self.refresh_keyword);

        if refresh {
            info!("Refresh requested, dropping validated documents");
            self.cache.clear_documents().await;
        }

        let matching = self.matching_files(&keywords).await;
        debug!(
            "{} of {} page(s) match {:?}",
            matching.len(),
            self.files.len(),
            keywords
        );

        let round = self
            .engine
            .audit_files_with_progress(&self.root, &matching, &self.cache, progress_callback)
            .await?;

        let summary = Summary::from_documents(round.documents.values().map(|d| d.as_ref()));

        Ok(SearchReport {
            documents: round.documents,
            summary,
            refreshed: refresh,
            stats: round.stats,
        })
    }

    async fn matching_files(&self, keywords: &[String]) -> Vec<PathBuf> {
        if keywords.is_empty() {
            return self.files.clone();
        }

        let mut matching = Vec::new();
        for path in &self.files {
            let path_text = path.to_string_lossy().to_lowercase();
            if keywords.iter().any(|k| path_text.contains(k.as_str())) {
                matching.push(path.clone());
                continue;
            }

            let author = self.author_of(path).await.to_lowercase();
            if !author.is_empty() && keywords.iter().any(|k| author.contains(k.as_str())) {
                matching.push(path.clone());
            }
        }
        matching
    }

    /// Meta author of a page, from the validated document when there is one.
    async fn author_of(&self, path: &Path) -> String {
        if let Some(document) = self.cache.document(path).await {
            return document.author.clone();
        }

        match self.cache.load_raw_text(&self.root, path).await {
            Ok(raw_text) => meta_author(&parser::parse(&raw_text)),
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                String::new()
            }
        }
    }
}
