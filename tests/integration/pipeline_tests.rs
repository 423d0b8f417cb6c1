//! The concurrent audit pipeline against sites on disk

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use html_audit::{AuditProgress, ProblemKind, ProgressCallback, RemoteStatus, SessionCache};

use crate::common::mocks::{MockConformance, MockProbe, validator_message};
use crate::common::test_helpers::{TestSite, clean_page, page, test_engine};

async fn blog_site() -> TestSite {
    let site = TestSite::new();
    site.write("index.html", &clean_page("Mario Rossi")).await;
    site.write(
        "blog/post.html",
        &page(
            Some("Anna Bianchi"),
            Some("Anna Bianchi"),
            r#"<a href="../index.html">Home</a> <a href="gone.html">Old</a> <img src="http://cdn.example.org/x.png">"#,
        ),
    )
    .await;
    site.write(
        "about.html",
        &page(Some("Luigi Verdi"), Some("Mario Rossi"), "<p>About</p>"),
    )
    .await;
    site
}

#[tokio::test]
async fn test_every_page_gets_its_problems() {
    let site = blog_site().await;
    let probe = Arc::new(
        MockProbe::new().with_status("http://cdn.example.org/x.png", RemoteStatus::ClientError),
    );
    let conformance = Arc::new(MockConformance::new().with_messages(
        "index.html",
        vec![validator_message("info", "Trailing slash on void elements", 3)],
    ));
    let engine = test_engine(probe.clone(), conformance.clone(), Duration::from_secs(30));
    let cache = SessionCache::new();
    let files = site.discover().await;

    let documents = engine.audit_files(site.root(), &files, &cache).await.unwrap();

    assert_eq!(documents.len(), 3);

    let index = &documents[&PathBuf::from("index.html")];
    assert_eq!(index.author, "Mario Rossi");
    assert_eq!(index.problems.len(), 1);
    assert_eq!(index.problems[0].kind, ProblemKind::Info);
    assert_eq!(index.problems[0].first_line, 3);

    let post = &documents[&PathBuf::from("blog/post.html")];
    let broken: Vec<&str> = post.problems.iter().map(|p| p.extract.as_str()).collect();
    assert_eq!(broken, vec!["gone.html", "http://cdn.example.org/x.png"]);
    assert!(post.problems.iter().all(|p| p.message == "broken link"));

    let about = &documents[&PathBuf::from("about.html")];
    let messages: Vec<&str> = about.problems.iter().map(|p| p.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["mismatch between author specified in meta and footer"]
    );
    assert_eq!(about.problems[0].extract, r#""Luigi Verdi" vs. "Mario Rossi""#);

    assert_eq!(conformance.call_count(), 3);
    assert_eq!(probe.requests(), vec!["http://cdn.example.org/x.png"]);
}

#[tokio::test]
async fn test_second_round_is_served_from_cache() {
    let site = blog_site().await;
    let conformance = Arc::new(MockConformance::new());
    let engine = test_engine(
        Arc::new(MockProbe::new()),
        conformance.clone(),
        Duration::from_secs(30),
    );
    let cache = SessionCache::new();
    let files = site.discover().await;

    let first = engine
        .audit_files_with_progress(site.root(), &files, &cache, None)
        .await
        .unwrap();
    let second = engine
        .audit_files_with_progress(site.root(), &files, &cache, None)
        .await
        .unwrap();

    assert_eq!(first.stats.audited, 3);
    assert_eq!(second.stats.cached, 3);
    assert_eq!(second.stats.audited, 0);
    assert_eq!(conformance.call_count(), 3);

    for (path, document) in &second.documents {
        assert!(Arc::ptr_eq(document, &first.documents[path]));
    }
}

#[tokio::test]
async fn test_duplicate_paths_are_audited_once() {
    let site = blog_site().await;
    let conformance = Arc::new(MockConformance::new());
    let engine = test_engine(
        Arc::new(MockProbe::new()),
        conformance.clone(),
        Duration::from_secs(30),
    );
    let cache = SessionCache::new();
    let paths = vec![PathBuf::from("index.html"), PathBuf::from("index.html")];

    let documents = engine.audit_files(site.root(), &paths, &cache).await.unwrap();

    assert_eq!(documents.len(), 1);
    assert_eq!(conformance.calls_for("index.html"), 1);
}

#[tokio::test]
async fn test_unreadable_pages_are_skipped() {
    let site = blog_site().await;
    let engine = test_engine(
        Arc::new(MockProbe::new()),
        Arc::new(MockConformance::new()),
        Duration::from_secs(30),
    );
    let cache = SessionCache::new();
    let paths = vec![PathBuf::from("index.html"), PathBuf::from("vanished.html")];

    let round = engine
        .audit_files_with_progress(site.root(), &paths, &cache, None)
        .await
        .unwrap();

    assert_eq!(round.documents.len(), 1);
    assert_eq!(round.stats.unreadable, 1);
}

#[tokio::test]
async fn test_slow_pages_time_out_and_are_not_cached() {
    let site = blog_site().await;
    let conformance = Arc::new(MockConformance::new().with_delay(Duration::from_secs(5)));
    let engine = test_engine(
        Arc::new(MockProbe::new()),
        conformance.clone(),
        Duration::from_millis(50),
    );
    let cache = SessionCache::new();
    let paths = vec![PathBuf::from("index.html")];

    let round = engine
        .audit_files_with_progress(site.root(), &paths, &cache, None)
        .await
        .unwrap();

    assert_eq!(round.stats.timed_out, 1);
    let document = &round.documents[&PathBuf::from("index.html")];
    assert_eq!(document.problems.len(), 1);
    assert_eq!(document.problems[0].kind, ProblemKind::NonDocumentError);
    assert!(cache.document(&PathBuf::from("index.html")).await.is_none());
}

#[tokio::test]
async fn test_validator_outage_is_not_a_problem() {
    let site = blog_site().await;
    let engine = test_engine(
        Arc::new(MockProbe::new()),
        Arc::new(MockConformance::unavailable()),
        Duration::from_secs(30),
    );
    let cache = SessionCache::new();
    let paths = vec![PathBuf::from("index.html")];

    let documents = engine.audit_files(site.root(), &paths, &cache).await.unwrap();

    assert!(documents[&PathBuf::from("index.html")].problems.is_empty());
}

#[tokio::test]
async fn test_progress_reaches_total() {
    let site = blog_site().await;
    let engine = test_engine(
        Arc::new(MockProbe::new()),
        Arc::new(MockConformance::new()),
        Duration::from_secs(30),
    );
    let cache = SessionCache::new();
    let files = site.discover().await;

    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(Mutex::new(None::<AuditProgress>));
    let callback: ProgressCallback = {
        let calls = Arc::clone(&calls);
        let last = Arc::clone(&last);
        Arc::new(move |progress: AuditProgress| {
            calls.fetch_add(1, Ordering::SeqCst);
            let mut last = last.lock().unwrap();
            if last.as_ref().is_none_or(|p| p.completed < progress.completed) {
                *last = Some(progress);
            }
        })
    };

    engine
        .audit_files_with_progress(site.root(), &files, &cache, Some(callback))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let last = last.lock().unwrap().clone().unwrap();
    assert_eq!((last.completed, last.total), (3, 3));
}
