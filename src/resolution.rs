//! Issue and suggestion reporting.
//!
//! The orchestration layer surfaces recoverable system conditions here instead
//! of burying them in error messages. Each issue carries a kind, the scope it
//! applies to, and zero or more actionable suggestions.

use std::sync::Mutex;
use tracing::info;

/// Kind of a reported issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueType {
    /// A registry refused pulls because of rate limiting
    DockerRateLimit,
}

/// Scope an issue applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextType {
    /// The whole host system
    System,
}

/// Actionable remediation attached to an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionType {
    /// Log in to the registry to lift per-IP limits
    RegistryLogin,
}

/// One reported condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// What happened
    pub kind: IssueType,
    /// Where it applies
    pub context: ContextType,
    /// How to remediate it
    pub suggestions: Vec<SuggestionType>,
}

impl Issue {
    /// Issue raised when a registry pull hits a rate limit.
    pub fn registry_rate_limit() -> Self {
        Self {
            kind: IssueType::DockerRateLimit,
            context: ContextType::System,
            suggestions: vec![SuggestionType::RegistryLogin],
        }
    }
}

/// Sink for reported issues.
pub trait IssueReporter: Send + Sync {
    /// Record one issue.
    fn create_issue(&self, issue: Issue);
}

/// Reporter that logs issues and keeps them for inspection.
#[derive(Default)]
pub struct IssueLog {
    issues: Mutex<Vec<Issue>>,
}

impl IssueLog {
    /// Return a snapshot of everything reported so far.
    pub fn issues(&self) -> Vec<Issue> {
        self.issues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl IssueReporter for IssueLog {
    fn create_issue(&self, issue: Issue) {
        info!("System issue reported: {:?}", issue.kind);
        self.issues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(issue);
    }
}
