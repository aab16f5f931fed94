//! Issue tracker port for querying ticket statuses.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Boxed future type alias used by [`StatusTracker`] to keep the trait dyn-compatible.
pub type TrackerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<IssueStatus>, TrackerError>> + Send + 'a>>;

/// Current status of one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStatus {
    /// Ticket key, e.g. `ACME-42`.
    pub key: String,
    /// Status name as reported by the tracker; `None` if it sent none.
    pub status: Option<String>,
}

impl IssueStatus {
    /// Creates a status entry with a known status name.
    pub fn new(key: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: Some(status.into()),
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            Some(name) => write!(f, "{} ({name})", self.key),
            None => write!(f, "{} (no status)", self.key),
        }
    }
}

/// Fetches ticket statuses from an external tracker.
///
/// Abstracting the tracker allows deterministic replay and testing
/// without touching a real tracker API.
pub trait StatusTracker: Send + Sync {
    /// Fetches the status of every ticket in `keys`, all from `project`.
    ///
    /// Keys unknown to the tracker are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be reached or answers with
    /// something other than a well-formed status list.
    fn bulk_fetch(&self, project: &str, keys: &[String]) -> TrackerFuture<'_>;
}
