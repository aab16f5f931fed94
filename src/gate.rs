//! The bug-status gate: marks a test as expected to fail while its linked
//! tickets are still open.

use tracing::{debug, error, info, warn};

use crate::annotation::{bug_refs, single_project};
use crate::config::{DoneStatuses, GateConfig, TrackerErrorPolicy};
use crate::error::GateError;
use crate::ports::test_info::TestInfo;
use crate::ports::tracker::{IssueStatus, StatusTracker};

const EXPECTED_FAILURE_PREFIX: &str =
    "Test is expected to fail, because associated jira tickets are in progress:";

/// What the gate decided for one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// No credential configured; statuses were not checked.
    Disabled,
    /// The test has no bug annotations.
    NoBugs,
    /// Every linked ticket is resolved.
    Resolved {
        /// Statuses returned by the tracker.
        checked: Vec<IssueStatus>,
    },
    /// At least one ticket is open; the test was marked as expected to fail.
    ExpectedFailure {
        /// The open tickets.
        open: Vec<IssueStatus>,
        /// The diagnostic passed to the test framework.
        reason: String,
    },
    /// The tracker failed and the policy is to ignore it.
    StatusUnknown {
        /// The tracker error, rendered.
        error: String,
    },
}

impl GateOutcome {
    /// Whether the test was marked as expected to fail.
    #[must_use]
    pub fn is_expected_failure(&self) -> bool {
        matches!(self, Self::ExpectedFailure { .. })
    }
}

/// Checks linked tickets before a test body runs.
pub struct BugStatusGate {
    config: GateConfig,
    tracker: Box<dyn StatusTracker>,
    requires_credential: bool,
}

impl BugStatusGate {
    /// Creates a gate using `tracker` for status lookups.
    pub fn new(config: GateConfig, tracker: Box<dyn StatusTracker>) -> Self {
        Self {
            config,
            tracker,
            requires_credential: true,
        }
    }

    /// Checks tickets even when no credential is configured.
    ///
    /// For trackers that answer offline, such as a cassette replay.
    #[must_use]
    pub fn without_credential_check(mut self) -> Self {
        self.requires_credential = false;
        self
    }

    /// The gate's configuration.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Inspects the current test's annotations and marks it as expected to
    /// fail if any linked ticket is not in a done status.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidAnnotation`] or [`GateError::MixedProjects`]
    /// for unusable annotations (before any tracker call), and
    /// [`GateError::Tracker`] when the tracker fails under
    /// [`TrackerErrorPolicy::Fail`].
    pub async fn check(&self, info: &mut dyn TestInfo) -> Result<GateOutcome, GateError> {
        if self.requires_credential && self.config.credential.is_none() {
            warn!("Jira test skipper token is not set. Jira statuses will not be checked.");
            return Ok(GateOutcome::Disabled);
        }

        let bugs = bug_refs(info.annotations())?;
        let Some(project) = single_project(&bugs)? else {
            return Ok(GateOutcome::NoBugs);
        };
        let keys: Vec<String> = bugs.iter().map(|b| b.id.clone()).collect();
        debug!(project, ?keys, "checking linked tickets");

        let statuses = match self.tracker.bulk_fetch(project, &keys).await {
            Ok(statuses) => statuses,
            Err(err) => {
                error!(error = %err, "Error checking Jira tickets");
                return match self.config.on_tracker_error {
                    TrackerErrorPolicy::Ignore => Ok(GateOutcome::StatusUnknown {
                        error: err.to_string(),
                    }),
                    TrackerErrorPolicy::Fail => Err(err.into()),
                };
            }
        };

        for key in keys.iter().filter(|k| !statuses.iter().any(|s| &s.key == *k)) {
            warn!(key = %key, "tracker returned no status for ticket");
        }

        let open = open_issues(&statuses, &self.config.done_statuses);
        if open.is_empty() {
            return Ok(GateOutcome::Resolved { checked: statuses });
        }

        let reason = expected_failure_reason(&open);
        info!(open = open.len(), "marking test as expected to fail");
        info.expect_failure(reason.clone());
        Ok(GateOutcome::ExpectedFailure { open, reason })
    }
}

/// Tickets whose status is not a done status. A missing status counts as open.
#[must_use]
pub fn open_issues(statuses: &[IssueStatus], done: &DoneStatuses) -> Vec<IssueStatus> {
    statuses
        .iter()
        .filter(|s| !done.contains(s.status.as_deref()))
        .cloned()
        .collect()
}

/// Diagnostic listing each open ticket's key and status, one per line.
#[must_use]
pub fn expected_failure_reason(open: &[IssueStatus]) -> String {
    let mut reason = EXPECTED_FAILURE_PREFIX.to_string();
    for issue in open {
        reason.push_str("\n  ");
        reason.push_str(&issue.to_string());
    }
    reason
}
