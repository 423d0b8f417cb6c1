use clap::Parser;
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum VerbosityLevel {
    /// Only the aggregated counts
    Quiet,
    /// Per-document problem lists
    #[default]
    Normal,
    /// Adds columns and round statistics
    Verbose,
}

impl VerbosityLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            VerbosityLevel::Quiet
        } else if verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Interactive auditor for a tree of HTML pages
#[derive(Parser, Debug, Clone)]
#[command(name = "html-audit")]
#[command(
    about = "Check author metadata, footers and links of a static site, and collect HTML validator findings"
)]
#[command(version)]
pub struct Cli {
    /// Site root to scan for HTML files
    #[arg(default_value = ".", help = "Site root directory")]
    pub path: PathBuf,

    /// Run one search with these keywords and exit instead of prompting
    #[arg(short = 'k', long = "keywords", help = "Run a single search and exit")]
    pub keywords: Option<String>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// File extensions to process (comma-separated)
    #[arg(
        short = 'e',
        long = "extensions",
        help = "File extensions to process (e.g., 'html,htm')"
    )]
    pub extensions: Option<String>,

    /// Number of concurrent audits
    #[arg(short = 't', long = "threads", help = "Number of concurrent audits")]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (summary only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Number of retry attempts for failed requests
    #[arg(long = "retry-attempts")]
    pub retry_attempts: Option<u32>,

    /// Conformance checker endpoint
    #[arg(long = "validator-url")]
    pub validator_url: Option<String>,

    /// Keyword that forces re-validation of matching pages
    #[arg(long = "refresh-keyword")]
    pub refresh_keyword: Option<String>,

    /// Exclude file patterns (regex syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Skip remote link probes and the conformance checker
    #[arg(long = "offline")]
    pub offline: bool,

    /// Disable ANSI colors
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Show progress indicators
    #[arg(long = "progress")]
    pub progress: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.path.is_dir() {
            return Err(format!("Not a directory: {}", self.path.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.verbose, self.quiet)
    }
}
