//! Terminal rendering of search results

use std::time::Duration;

use crate::cli::VerbosityLevel;
use crate::document::{Document, Problem, ProblemKind, UNKNOWN_POSITION};
use crate::engine::{AuditProgress, RoundStats};
use crate::session::{SearchReport, Summary};

const RED: &str = "31";
const GREEN: &str = "32";
const YELLOW: &str = "33";
const BLUE: &str = "34";
const MAGENTA: &str = "35";
const CYAN: &str = "36";

/// ANSI color of a problem kind, `None` for the terminal default
fn kind_color(kind: ProblemKind) -> Option<&'static str> {
    match kind {
        ProblemKind::Error => Some(RED),
        ProblemKind::Warning => Some(YELLOW),
        ProblemKind::Info => Some(CYAN),
        ProblemKind::NonDocumentError => Some(MAGENTA),
        ProblemKind::Unknown => None,
    }
}

/// Human-readable formatter for search reports
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn colorize_kind(&self, text: &str, kind: ProblemKind) -> String {
        match kind_color(kind) {
            Some(color) => self.colorize(text, color),
            None => text.to_string(),
        }
    }

    pub fn format_report(&self, report: &SearchReport) -> String {
        let mut output = String::new();

        if report.refreshed && self.verbosity > VerbosityLevel::Quiet {
            output.push_str("Validated pages dropped, checking again\n");
        }

        if report.documents.is_empty() {
            output.push_str("No matching results for given keyword(s)\n");
            return output;
        }

        if self.verbosity > VerbosityLevel::Quiet {
            for document in report.documents.values() {
                output.push_str(&self.format_document(document));
            }
            output.push('\n');
        }

        output.push_str(&self.format_summary(&report.summary));

        if self.verbosity == VerbosityLevel::Verbose {
            output.push_str(&format_stats(&report.stats));
        }

        output
    }

    pub fn format_document(&self, document: &Document) -> String {
        let mut output = format!("\n{}\n", document.path.display());
        let author = if document.author.is_empty() {
            "(none)"
        } else {
            document.author.as_str()
        };
        output.push_str(&format!("Author: {}\n", author));

        if document.problems.is_empty() {
            output.push_str(&format!("{}\n", self.colorize("No problems found", GREEN)));
        }
        for problem in &document.problems {
            output.push_str(&self.format_problem(problem));
        }
        output
    }

    pub fn format_problem(&self, problem: &Problem) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "  Type: {}\n",
            self.colorize_kind(problem.kind.label(), problem.kind)
        ));
        output.push_str(&format!("  Message: {}\n", problem.message));
        output.push_str(&format!(
            "  Extract: {}\n",
            self.colorize(problem.extract.trim(), BLUE)
        ));

        if self.verbosity == VerbosityLevel::Verbose {
            output.push_str(&format!(
                "  From: {} To: {}\n",
                format_position(problem.first_line, problem.first_column),
                format_position(problem.last_line, problem.last_column)
            ));
        } else {
            output.push_str(&format!("  Line: {}\n", format_line(problem.first_line)));
        }
        output
    }

    pub fn format_summary(&self, summary: &Summary) -> String {
        let mut output = String::from("Aggregated data:\n");
        output.push_str(&format!("  pages: {}\n", summary.pages));
        for kind in ProblemKind::ALL {
            let label = format!("{}:", kind.plural());
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize_kind(&label, kind),
                summary.count(kind)
            ));
        }
        output
    }

    pub fn format_progress(&self, progress: &AuditProgress) -> String {
        let current = progress
            .current_file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        format!("[{}/{}] {}", progress.completed, progress.total, current)
    }
}

fn format_line(line: i64) -> String {
    if line == UNKNOWN_POSITION {
        "?".to_string()
    } else {
        line.to_string()
    }
}

fn format_position(line: i64, column: i64) -> String {
    if column == UNKNOWN_POSITION {
        format_line(line)
    } else {
        format!("{}:{}", format_line(line), column)
    }
}

fn format_stats(stats: &RoundStats) -> String {
    let mut output = String::from("\nRound:\n");
    output.push_str(&format!("  From cache: {}\n", stats.cached));
    output.push_str(&format!("  Audited: {}\n", stats.audited));
    if stats.timed_out > 0 {
        output.push_str(&format!("  Timed out: {}\n", stats.timed_out));
    }
    if stats.failed > 0 {
        output.push_str(&format!("  Failed: {}\n", stats.failed));
    }
    if stats.unreadable > 0 {
        output.push_str(&format!("  Unreadable: {}\n", stats.unreadable));
    }
    output.push_str(&format!("  Duration: {}\n", format_duration(stats.duration)));
    output
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
