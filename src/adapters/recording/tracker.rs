//! Recording adapter for the `StatusTracker` port.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::tracker::{StatusTracker, TrackerFuture};

/// Records tracker interactions while delegating to an inner implementation.
pub struct RecordingTracker {
    inner: Box<dyn StatusTracker>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingTracker {
    /// Creates a new recording tracker wrapping the given implementation.
    pub fn new(inner: Box<dyn StatusTracker>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

/// Input recorded for a bulk fetch.
#[derive(Serialize)]
pub(crate) struct BulkFetchInput<'a> {
    pub(crate) project: &'a str,
    pub(crate) keys: &'a [String],
}

impl StatusTracker for RecordingTracker {
    fn bulk_fetch(&self, project: &str, keys: &[String]) -> TrackerFuture<'_> {
        let project = project.to_string();
        let keys = keys.to_vec();

        Box::pin(async move {
            let result = self.inner.bulk_fetch(&project, &keys).await;
            let input = BulkFetchInput {
                project: &project,
                keys: &keys,
            };
            record_result(&self.recorder, "tracker", "bulk_fetch", &input, &result);
            result
        })
    }
}
