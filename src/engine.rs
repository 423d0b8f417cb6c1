use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::cache::SessionCache;
use crate::document::{Document, Problem, ProblemKind};
use crate::error::{AuditError, Result};
use crate::validator::DocumentValidator;

/// Configuration for the audit engine
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    /// Maximum number of concurrent document audits
    pub max_concurrent_audits: usize,
    /// Upper bound on one document's audit, network checks included
    pub audit_timeout: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_concurrent_audits: num_cpus::get(),
            audit_timeout: Duration::from_secs(120),
        }
    }
}

/// Progress update for an audit round
#[derive(Debug, Clone)]
pub struct AuditProgress {
    /// File that just finished
    pub current_file: Option<PathBuf>,
    /// Number of files completed in this round
    pub completed: usize,
    /// Number of files audited in this round (cache hits excluded)
    pub total: usize,
}

/// Progress callback type for audit updates
pub type ProgressCallback = Arc<dyn Fn(AuditProgress) + Send + Sync>;

/// Counters for one call to [`AuditEngine::audit_files_with_progress`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundStats {
    pub cached: usize,
    pub audited: usize,
    pub timed_out: usize,
    pub unreadable: usize,
    /// Workers that ended in an error; their pages are left out of the round
    pub failed: usize,
    pub duration: Duration,
}

/// Result of one audit round
#[derive(Debug, Clone, Default)]
pub struct AuditRound {
    pub documents: BTreeMap<PathBuf, Arc<Document>>,
    pub stats: RoundStats,
}

struct WorkerOutcome {
    document: Document,
    finished: bool,
}

/// Runs document audits in parallel over a shared session cache.
///
/// Each round splits the requested paths into cache hits and misses, audits
/// the misses in semaphore-bounded tokio tasks, waits for all of them, and
/// only then writes the fresh results back into the cache.
pub struct AuditEngine {
    validator: Arc<DocumentValidator>,
    config: AuditConfig,
}

impl AuditEngine {
    pub fn new(validator: DocumentValidator, config: AuditConfig) -> Self {
        Self {
            validator: Arc::new(validator),
            config,
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Audit `paths` (relative to `root`), reusing cached documents.
    pub async fn audit_files(
        &self,
        root: &Path,
        paths: &[PathBuf],
        cache: &SessionCache,
    ) -> Result<BTreeMap<PathBuf, Arc<Document>>> {
        Ok(self
            .audit_files_with_progress(root, paths, cache, None)
            .await?
            .documents)
    }

    /// Audit with progress tracking
    pub async fn audit_files_with_progress(
        &self,
        root: &Path,
        paths: &[PathBuf],
        cache: &SessionCache,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<AuditRound> {
        let start_time = Instant::now();
        let mut round = AuditRound::default();

        // Partition into cache hits and work items
        let mut work = Vec::new();
        for path in paths.iter().collect::<BTreeSet<_>>() {
            if let Some(document) = cache.document(path).await {
                round.documents.insert(path.clone(), document);
                round.stats.cached += 1;
                continue;
            }

            match cache.load_raw_text(root, path).await {
                Ok(raw_text) => work.push((path.clone(), raw_text)),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    round.stats.unreadable += 1;
                }
            }
        }

        debug!(
            "{} cached, {} to audit",
            round.stats.cached,
            work.len()
        );

        if work.is_empty() {
            round.stats.duration = start_time.elapsed();
            return Ok(round);
        }

        let total_files = work.len();
        let completed = Arc::new(AtomicUsize::new(0));

        // Create a semaphore to limit concurrent audits
        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_concurrent_audits.max(1),
        ));

        let audit_tasks: Vec<_> = work
            .into_iter()
            .map(|(path, raw_text)| {
                let validator = Arc::clone(&self.validator);
                let semaphore = Arc::clone(&semaphore);
                let timeout = self.config.audit_timeout;
                let progress_callback = progress_callback.clone();
                let completed = Arc::clone(&completed);
                let root = root.to_path_buf();

                tokio::spawn(async move {
                    let outcome = async {
                        // Acquire semaphore permit to limit concurrency
                        let _permit = semaphore.acquire().await.map_err(|_| {
                            AuditError::Concurrency {
                                details: "Failed to acquire audit semaphore".to_string(),
                            }
                        })?;

                        let result = tokio::time::timeout(
                            timeout,
                            Self::audit_single_file(
                                validator,
                                root,
                                path.clone(),
                                Arc::clone(&raw_text),
                            ),
                        )
                        .await;

                        let outcome = match result {
                            Ok(document) => WorkerOutcome {
                                document: document?,
                                finished: true,
                            },
                            Err(_) => {
                                warn!("Audit of {} timed out after {:?}", path.display(), timeout);
                                WorkerOutcome {
                                    document: timed_out_document(&path, &raw_text, timeout),
                                    finished: false,
                                }
                            }
                        };
                        Ok::<WorkerOutcome, AuditError>(outcome)
                    }
                    .await;

                    // Update progress
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = progress_callback {
                        callback(AuditProgress {
                            current_file: Some(path.clone()),
                            completed: done,
                            total: total_files,
                        });
                    }

                    (path, outcome)
                })
            })
            .collect();

        // Join barrier: nothing is written to the cache before every task is done
        let task_results =
            try_join_all(audit_tasks)
                .await
                .map_err(|e| AuditError::Concurrency {
                    details: format!("Task join error: {}", e),
                })?;

        for (path, outcome) in task_results {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Audit of {} failed: {}", path.display(), e);
                    round.stats.failed += 1;
                    continue;
                }
            };
            let document = Arc::new(outcome.document);

            if outcome.finished {
                cache.insert_document(Arc::clone(&document)).await;
                round.stats.audited += 1;
            } else {
                round.stats.timed_out += 1;
            }
            round.documents.insert(document.path.clone(), document);
        }

        round.stats.duration = start_time.elapsed();
        info!(
            "Audited {} file(s) in {:?} ({} cached, {} timed out, {} failed)",
            round.stats.audited,
            round.stats.duration,
            round.stats.cached,
            round.stats.timed_out,
            round.stats.failed
        );

        Ok(round)
    }

    /// Parse and validate one file
    async fn audit_single_file(
        validator: Arc<DocumentValidator>,
        root: PathBuf,
        path: PathBuf,
        raw_text: Arc<str>,
    ) -> Result<Document> {
        debug!("Auditing {}", path.display());

        // Parsing is CPU-bound, keep it off the async workers
        let parse_path = path.clone();
        let mut document =
            tokio::task::spawn_blocking(move || Document::parse(parse_path, &*raw_text))
                .await
                .map_err(|e| AuditError::Concurrency {
                    details: format!("Join error: {}", e),
                })?;

        // A panicking collaborator only loses this page
        AssertUnwindSafe(async {
            validator.validate(&path, &root, &mut document).await;
            document
        })
        .catch_unwind()
        .await
        .map_err(|_| AuditError::Concurrency {
            details: format!("Validation of {} panicked", path.display()),
        })
    }
}

/// Stand-in for a document whose audit did not finish in time
fn timed_out_document(path: &Path, raw_text: &str, timeout: Duration) -> Document {
    let mut document = Document::parse(path, raw_text);
    document.problems.push(Problem::new(
        ProblemKind::NonDocumentError,
        format!("validation timed out after {:?}", timeout),
        "No extract",
    ));
    document
}
