use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::{Document, Problem, ProblemKind, UNKNOWN_POSITION};
use crate::http_client::{ConformanceValidator, ReachabilityProbe, ValidatorMessage};
use crate::link::LinkResolver;
use crate::query;

/// Markup suggested when a page has no footer author
pub const FOOTER_SNIPPET: &str = "\n\t\t<section id=\"footer\">\n\t\t\t<div class=\"container\">\n\t\t\t\t<h4>Author</h4>\n\t\t\t\t<address>Your Name</address>\n\t\t\t</div>\n\t\t</section>";

/// Applies the structural rules to a parsed page and merges in the
/// conformance checker's findings.
pub struct DocumentValidator {
    links: LinkResolver,
    conformance: Arc<dyn ConformanceValidator>,
}

impl DocumentValidator {
    pub fn new(
        probe: Arc<dyn ReachabilityProbe>,
        conformance: Arc<dyn ConformanceValidator>,
    ) -> Self {
        Self {
            links: LinkResolver::new(probe),
            conformance,
        }
    }

    /// Append every problem found in `document`, whose `path` is relative to `base_path`.
    ///
    /// Rules run in a fixed order: author, links, footer, then external findings.
    pub async fn validate(&self, path: &Path, base_path: &Path, document: &mut Document) {
        check_author(document);
        self.check_links(path, base_path, document).await;
        check_footer(document);
        self.merge_conformance_findings(path, base_path, document).await;

        debug!(
            "{}: {} problem(s)",
            path.display(),
            document.problems.len()
        );
    }

    async fn check_links(&self, path: &Path, base_path: &Path, document: &mut Document) {
        let page_dir = base_path.join(path.parent().unwrap_or(Path::new("")));

        let anchors = query::find_all(&document.tree, "a", &[("href", "")]);
        let images = query::find_all(&document.tree, "img", &[("src", "")]);

        let mut broken = Vec::new();
        for (element, url) in anchors
            .iter()
            .map(|e| (*e, e.attr("href")))
            .chain(images.iter().map(|e| (*e, e.attr("src"))))
        {
            let url = url.unwrap_or_default();
            if !self.links.is_valid(url, &page_dir, &document.tree).await {
                let line = document.line_of(&element.raw_text);
                broken.push(Problem::error("broken link", url).at_line(line));
            }
        }

        document.problems.extend(broken);
    }

    async fn merge_conformance_findings(
        &self,
        path: &Path,
        base_path: &Path,
        document: &mut Document,
    ) {
        match self.conformance.check(&base_path.join(path)).await {
            Some(messages) => document
                .problems
                .extend(messages.into_iter().map(Problem::from)),
            None => warn!("No findings from validator for {}", path.display()),
        }
    }
}

fn check_author(document: &mut Document) {
    if document.author.is_empty() {
        document.problems.push(Problem::error("missing author", ""));
    }
}

/// Compare `section#footer > div.container > address` with the meta author.
fn check_footer(document: &mut Document) {
    let footer = query::find_first(&document.tree, "section", &[("id", "footer")]);
    let container = query::find_first(&footer.children, "div", &[("class", "container")]);
    let address = query::find_first(&container.children, "address", &[]);

    let written = decode_entities(&address.content);
    let written = written.trim();
    if written.is_empty() {
        document
            .problems
            .push(Problem::error("missing footer author", FOOTER_SNIPPET));
        return;
    }

    // The text of an `a` inside the address is accepted as an alternate spelling
    let anchor = query::find_first(&address.children, "a", &[]);
    let link_text = decode_entities(&anchor.content);
    let link = (!anchor.is_empty()).then(|| link_text.trim());
    if written == document.author || link == Some(document.author.as_str()) {
        return;
    }

    let shown = link.filter(|l| !l.is_empty()).unwrap_or(written);
    let extract = format!("\"{}\" vs. \"{}\"", document.author, shown);
    let line = document.line_of(&address.raw_text);
    document.problems.push(
        Problem::error("mismatch between author specified in meta and footer", extract)
            .at_line(line),
    );
}

fn decode_entities(text: &str) -> String {
    text.replace("&ograve;", "ò")
}

impl From<ValidatorMessage> for Problem {
    fn from(message: ValidatorMessage) -> Self {
        let last_line = message.last_line.unwrap_or(UNKNOWN_POSITION);
        let last_column = message.last_column.unwrap_or(UNKNOWN_POSITION);

        Problem {
            kind: ProblemKind::from_validator(message.kind.as_deref(), message.sub_type.as_deref()),
            message: message.message.unwrap_or_else(|| "No message".to_string()),
            extract: message.extract.unwrap_or_else(|| "No extract".to_string()),
            first_line: message.first_line.unwrap_or(last_line),
            first_column: message.first_column.unwrap_or(last_column),
            last_line,
            last_column,
        }
    }
}
