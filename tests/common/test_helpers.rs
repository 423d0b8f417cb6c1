use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::fs;

use html_audit::{
    AuditConfig, AuditEngine, ConformanceValidator, DocumentValidator, FileDiscovery,
    ReachabilityProbe, Session,
};

/// A page with an optional meta author, a footer naming `footer_author` and `body`
pub fn page(author: Option<&str>, footer_author: Option<&str>, body: &str) -> String {
    let meta = author
        .map(|a| format!(r#"<meta name="author" content="{a}">"#))
        .unwrap_or_default();
    let footer = footer_author
        .map(|a| {
            format!(
                r#"<section id="footer"><div class="container"><h4>Author</h4><address>{a}</address></div></section>"#
            )
        })
        .unwrap_or_default();
    format!("<html>\n<head>\n{meta}\n</head>\n<body>\n{body}\n{footer}\n</body>\n</html>\n")
}

/// A page that passes every structural rule
pub fn clean_page(author: &str) -> String {
    page(Some(author), Some(author), "<p>Hello</p>")
}

/// A site root in a temporary directory
pub struct TestSite {
    dir: TempDir,
}

impl TestSite {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub async fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.unwrap();
        }
        fs::write(&path, contents).await.unwrap();
        PathBuf::from(relative)
    }

    pub async fn remove(&self, relative: &str) {
        fs::remove_file(self.dir.path().join(relative))
            .await
            .unwrap();
    }

    /// Pages as the binary would discover them
    pub async fn discover(&self) -> Vec<PathBuf> {
        FileDiscovery::new()
            .with_exclude_patterns(vec!["template".to_string()])
            .unwrap()
            .discover_files(self.root())
            .await
            .unwrap()
    }

    /// A session over every discovered page
    pub async fn session(
        &self,
        probe: Arc<dyn ReachabilityProbe>,
        conformance: Arc<dyn ConformanceValidator>,
    ) -> Session {
        let engine = test_engine(probe, conformance, Duration::from_secs(30));
        Session::new(self.root(), self.discover().await, engine, "refresh")
    }
}

pub fn test_engine(
    probe: Arc<dyn ReachabilityProbe>,
    conformance: Arc<dyn ConformanceValidator>,
    audit_timeout: Duration,
) -> AuditEngine {
    AuditEngine::new(
        DocumentValidator::new(probe, conformance),
        AuditConfig {
            max_concurrent_audits: 4,
            audit_timeout,
        },
    )
}
