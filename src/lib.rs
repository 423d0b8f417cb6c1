//! # html-audit Library
//!
//! Audits a tree of static HTML pages: author metadata, footer consistency and
//! broken links, merged with the findings of a remote conformance checker.
//! Pages are parsed with a small tree parser, validated concurrently and cached
//! for the lifetime of an interactive session.

pub mod cache;
pub mod cli;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod file_discovery;
pub mod http_client;
pub mod link;
pub mod output;
pub mod parser;
pub mod query;
pub mod session;
pub mod validator;

pub use cache::{SessionCache, SessionCacheStats};
pub use cli::{Cli, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager, EnvProvider, SystemEnvProvider};
pub use document::{Document, Problem, ProblemKind, UNKNOWN_POSITION};
pub use engine::{AuditConfig, AuditEngine, AuditProgress, AuditRound, ProgressCallback, RoundStats};
pub use error::{AuditError, Result};
pub use file_discovery::FileDiscovery;
pub use http_client::{
    AsyncHttpClient, ConformanceValidator, HttpClientConfig, OfflineCollaborators,
    ReachabilityProbe, RemoteStatus, ValidatorMessage,
};
pub use link::{LinkKind, LinkResolver};
pub use output::Output;
pub use parser::{Element, parse};
pub use query::{find_all, find_first};
pub use session::{SearchReport, Session, Summary};
pub use validator::DocumentValidator;
