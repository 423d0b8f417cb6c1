use std::fmt;
use std::path::PathBuf;

use crate::parser::{self, Element};
use crate::query;

/// Line or column value for a position that could not be determined
pub const UNKNOWN_POSITION: i64 = -1;

/// Severity of a [`Problem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProblemKind {
    Error,
    Warning,
    Info,
    /// The validator could not process the document at all
    NonDocumentError,
    Unknown,
}

impl ProblemKind {
    pub const ALL: [ProblemKind; 5] = [
        ProblemKind::Error,
        ProblemKind::Warning,
        ProblemKind::Info,
        ProblemKind::NonDocumentError,
        ProblemKind::Unknown,
    ];

    /// Map a validator message's `type`/`subType` pair onto a kind.
    ///
    /// `info` messages flagged with the `warning` sub-type are warnings.
    pub fn from_validator(kind: Option<&str>, sub_type: Option<&str>) -> Self {
        match (kind.unwrap_or("unknown"), sub_type) {
            ("error", _) => ProblemKind::Error,
            ("info", Some("warning")) | ("warning", _) => ProblemKind::Warning,
            ("info", _) => ProblemKind::Info,
            ("non-document-error", _) => ProblemKind::NonDocumentError,
            _ => ProblemKind::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProblemKind::Error => "error",
            ProblemKind::Warning => "warning",
            ProblemKind::Info => "info",
            ProblemKind::NonDocumentError => "non-document-error",
            ProblemKind::Unknown => "unknown",
        }
    }

    /// Key used in aggregated counts
    pub fn plural(self) -> &'static str {
        match self {
            ProblemKind::Error => "errors",
            ProblemKind::Warning => "warnings",
            ProblemKind::Info => "infos",
            ProblemKind::NonDocumentError => "non-document-errors",
            ProblemKind::Unknown => "unknowns",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One finding about a document.
///
/// Positions are 1-based; [`UNKNOWN_POSITION`] marks a value that is not known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub kind: ProblemKind,
    pub message: String,
    pub extract: String,
    pub first_line: i64,
    pub first_column: i64,
    pub last_line: i64,
    pub last_column: i64,
}

impl Problem {
    /// An error with every position unknown
    pub fn error(message: impl Into<String>, extract: impl Into<String>) -> Self {
        Self::new(ProblemKind::Error, message, extract)
    }

    pub fn new(kind: ProblemKind, message: impl Into<String>, extract: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            extract: extract.into(),
            first_line: UNKNOWN_POSITION,
            first_column: UNKNOWN_POSITION,
            last_line: UNKNOWN_POSITION,
            last_column: UNKNOWN_POSITION,
        }
    }

    pub fn at_line(mut self, line: i64) -> Self {
        self.first_line = line;
        self
    }
}

/// A page of the site together with everything found wrong with it
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the site root
    pub path: PathBuf,
    /// File text as read from disk, comments included
    pub raw_text: String,
    pub tree: Vec<Element>,
    /// Content of `<meta name="author">`, empty when absent
    pub author: String,
    pub problems: Vec<Problem>,
}

impl Document {
    /// Parse a page. The result carries no problems yet.
    pub fn parse(path: impl Into<PathBuf>, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let tree = parser::parse(&raw_text);
        let author = meta_author(&tree);

        Self {
            path: path.into(),
            raw_text,
            tree,
            author,
            problems: Vec::new(),
        }
    }

    /// Line of the first occurrence of `fragment` in the raw text.
    pub fn line_of(&self, fragment: &str) -> i64 {
        first_line_occurrence(&self.raw_text, fragment)
            .and_then(|line| i64::try_from(line).ok())
            .unwrap_or(UNKNOWN_POSITION)
    }

    pub fn count(&self, kind: ProblemKind) -> usize {
        self.problems.iter().filter(|p| p.kind == kind).count()
    }
}

/// Author declared by `<meta name="author" content="...">`, or empty.
pub fn meta_author(tree: &[Element]) -> String {
    query::find_first(tree, "meta", &[("name", "author")])
        .attr("content")
        .unwrap_or_default()
        .to_string()
}

/// 1-based line of the first occurrence of `pattern` in `text`.
pub fn first_line_occurrence(text: &str, pattern: &str) -> Option<usize> {
    text.find(pattern)
        .map(|offset| text[..offset].matches('\n').count() + 1)
}
