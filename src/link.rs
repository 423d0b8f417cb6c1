//! Link classification and resolution against the site on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::http_client::ReachabilityProbe;
use crate::parser::Element;
use crate::query;

/// The four shapes a link target can take, checked in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Starts with `http` or `www`
    Remote,
    /// `#anchor` within the same page
    InternalAnchor,
    /// Relative path without a fragment
    LocalFile,
    /// Relative path followed by `#anchor`
    LocalFileWithAnchor,
}

impl LinkKind {
    pub fn classify(url: &str) -> Self {
        if url.starts_with("http") || url.starts_with("www") {
            LinkKind::Remote
        } else if url.starts_with('#') {
            LinkKind::InternalAnchor
        } else if url.contains('#') {
            LinkKind::LocalFileWithAnchor
        } else {
            LinkKind::LocalFile
        }
    }
}

/// Decides whether `href`/`src` targets exist
pub struct LinkResolver {
    probe: Arc<dyn ReachabilityProbe>,
}

impl LinkResolver {
    pub fn new(probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self { probe }
    }

    /// Is `url`, found in a page under `base_path` whose tree is `tree`, valid?
    pub async fn is_valid(&self, url: &str, base_path: &Path, tree: &[Element]) -> bool {
        match LinkKind::classify(url) {
            LinkKind::Remote => self.probe.probe(url).await.is_reachable(),
            LinkKind::InternalAnchor => has_anchor(tree, &url[1..]),
            LinkKind::LocalFile => file_exists(&local_path(base_path, url)).await,
            LinkKind::LocalFileWithAnchor => {
                let (file, anchor) = url.split_once('#').unwrap_or((url, ""));
                file_contains_anchor(&local_path(base_path, file), anchor).await
            }
        }
    }
}

/// Some element carries `id` equal to `anchor`; a bare `#` matches any `id`.
fn has_anchor(tree: &[Element], anchor: &str) -> bool {
    !query::find_first(tree, "", &[("id", anchor)]).is_empty()
}

/// Join a relative link onto the page directory, decoding `%20` in the link only.
pub fn local_path(base_path: &Path, relative: &str) -> PathBuf {
    PathBuf::from(format!(
        "{}/{}",
        base_path.display(),
        relative.replace("%20", " ")
    ))
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Loose check: the anchor text appears anywhere in the target file.
async fn file_contains_anchor(path: &Path, anchor: &str) -> bool {
    match tokio::fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).contains(anchor),
        Err(e) => {
            debug!("Link target {} unreadable: {}", path.display(), e);
            false
        }
    }
}
