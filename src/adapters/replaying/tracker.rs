//! Replaying adapter for the `StatusTracker` port.

use std::path::Path;

use super::{recorded_output, replay_result};
use crate::adapters::recording::tracker::BulkFetchInput;
use crate::cassette::format::Cassette;
use crate::cassette::replayer::CassetteReplayer;
use crate::error::TrackerError;
use crate::ports::tracker::{IssueStatus, StatusTracker, TrackerFuture};

/// Serves recorded tracker results from a cassette, matched on
/// `{project, keys}`.
pub struct ReplayingTracker {
    replayer: CassetteReplayer,
}

impl ReplayingTracker {
    /// Create a replaying tracker backed by the given replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer }
    }

    /// Load a cassette file and replay its tracker interactions.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let cassette = Cassette::load(path)?;
        Ok(Self::new(CassetteReplayer::new(&cassette)))
    }
}

impl StatusTracker for ReplayingTracker {
    fn bulk_fetch(&self, project: &str, keys: &[String]) -> TrackerFuture<'_> {
        let input = BulkFetchInput { project, keys };
        let result: Result<Vec<IssueStatus>, TrackerError> =
            recorded_output(&self.replayer, "tracker", "bulk_fetch", &input)
                .and_then(replay_result);
        Box::pin(async move { result })
    }
}
