//! Error types for configuration, tracker access and the gate itself.

use thiserror::Error;

/// Invalid configuration value supplied through the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `JIRA_ON_TRACKER_ERROR` was neither `ignore` nor `fail`.
    #[error("invalid tracker error policy {value:?}, expected \"ignore\" or \"fail\"")]
    InvalidPolicy {
        /// The rejected value.
        value: String,
    },

    /// A numeric setting could not be parsed.
    #[error("invalid value {value:?} for {key}: expected a non-negative integer")]
    InvalidNumber {
        /// Environment variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Failure talking to the issue tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("tracker request failed: {message}")]
    Transport {
        /// Description of the underlying failure.
        message: String,
    },

    /// The tracker answered with a non-success HTTP status.
    #[error("tracker returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response body did not match the expected bulk-fetch schema.
    #[error("malformed tracker response: {message}")]
    MalformedResponse {
        /// Parser diagnostic.
        message: String,
    },

    /// A cassette could not serve the request, or served a recorded failure.
    #[error("replayed tracker interaction failed: {message}")]
    Replay {
        /// Replay diagnostic or the recorded error text.
        message: String,
    },
}

impl TrackerError {
    /// Whether retrying the same request might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse { .. } | Self::Replay { .. } => false,
        }
    }
}

/// Error raised by the gate; surfaces as a test setup failure.
#[derive(Debug, Error)]
pub enum GateError {
    /// A `bug` annotation does not carry a usable ticket URL.
    #[error("bug annotation {url:?} is not a ticket URL: {reason}")]
    InvalidAnnotation {
        /// The annotation description.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The test links tickets from more than one tracker project.
    #[error("all tickets must be from the same Jira project, found: {}", .projects.join(", "))]
    MixedProjects {
        /// Distinct projects, in annotation order.
        projects: Vec<String>,
    },

    /// The tracker failed and the configured policy is to fail the test.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The async runtime for a blocking gate run could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}
