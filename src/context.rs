//! Gate context wiring configuration and a tracker adapter together.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::adapters::live::jira::LiveJiraTracker;
use crate::adapters::recording::RecordingTracker;
use crate::adapters::replaying::ReplayingTracker;
use crate::cassette::recorder::CassetteRecorder;
use crate::config::GateConfig;
use crate::error::{GateError, TrackerError};
use crate::gate::BugStatusGate;
use crate::ports::tracker::{StatusTracker, TrackerFuture};

/// Environment variable naming a cassette to replay instead of calling Jira.
pub const REPLAY_ENV: &str = "BUG_GATE_REPLAY";
/// Environment variable naming a cassette to record live Jira calls into.
pub const RECORD_ENV: &str = "BUG_GATE_RECORD";

/// Bundles a configured gate with its tracker adapter.
///
/// Constructors wire up different adapter implementations (live,
/// recording, replaying). In recording mode the cassette is saved after
/// every tracker call and once more when the context is dropped.
pub struct GateContext {
    gate: BugStatusGate,
    recorder: Option<Arc<Mutex<CassetteRecorder>>>,
}

impl GateContext {
    /// Resolves configuration and tracker mode from the environment.
    ///
    /// `BUG_GATE_REPLAY` takes precedence over `BUG_GATE_RECORD`; with
    /// neither set the live Jira adapter is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the replay cassette
    /// cannot be loaded, or the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, GateError> {
        let config = GateConfig::from_env()?;
        let non_empty = |key: &str| {
            env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
        };

        if let Some(path) = non_empty(REPLAY_ENV) {
            return Self::replaying(config, Path::new(&path));
        }
        if let Some(path) = non_empty(RECORD_ENV) {
            return Self::recording(config, PathBuf::from(path));
        }
        Self::live(config)
    }

    /// Creates a context calling Jira directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn live(config: GateConfig) -> Result<Self, GateError> {
        let tracker = live_tracker(&config)?;
        Ok(Self {
            gate: BugStatusGate::new(config, tracker),
            recorder: None,
        })
    }

    /// Creates a context that calls Jira and records every response to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn recording(config: GateConfig, path: PathBuf) -> Result<Self, GateError> {
        let name = path.file_stem().map_or_else(
            || "bug-gate".to_string(),
            |stem| stem.to_string_lossy().trim_end_matches(".cassette").to_string(),
        );
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(
            path,
            name,
            revision_from_env(),
        )));
        let tracker = RecordingTracker::new(live_tracker(&config)?, Arc::clone(&recorder));
        Ok(Self {
            gate: BugStatusGate::new(config, Box::new(tracker)),
            recorder: Some(recorder),
        })
    }

    /// Creates a context serving tracker responses from the cassette at `path`.
    ///
    /// No credential is needed: the gate checks tickets against the cassette
    /// even when the token is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be read or parsed.
    pub fn replaying(config: GateConfig, path: &Path) -> Result<Self, GateError> {
        let tracker = ReplayingTracker::from_file(path)
            .map_err(|message| GateError::Tracker(TrackerError::Replay { message }))?;
        info!(cassette = %path.display(), "replaying tracker responses");
        Ok(Self {
            gate: BugStatusGate::new(config, Box::new(tracker)).without_credential_check(),
            recorder: None,
        })
    }

    /// The configured gate.
    #[must_use]
    pub fn gate(&self) -> &BugStatusGate {
        &self.gate
    }
}

impl Drop for GateContext {
    fn drop(&mut self) {
        let Some(recorder) = self.recorder.take() else {
            return;
        };
        match recorder.lock() {
            Ok(guard) => match guard.save() {
                Ok(path) => info!(cassette = %path.display(), "tracker recording saved"),
                Err(e) => warn!(error = %e, "failed to write cassette"),
            },
            Err(e) => warn!(error = %e, "recorder lock poisoned, cassette not written"),
        };
    }
}

fn live_tracker(config: &GateConfig) -> Result<Box<dyn StatusTracker>, GateError> {
    Ok(match LiveJiraTracker::from_config(config)? {
        Some(tracker) => Box::new(tracker),
        None => Box::new(UnconfiguredTracker),
    })
}

/// Revision recorded in cassettes, taken from common CI variables.
fn revision_from_env() -> String {
    ["GITHUB_SHA", "CI_COMMIT_SHA", "GIT_COMMIT"]
        .iter()
        .find_map(|key| env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Stands in for the live adapter when no credential is configured.
///
/// The gate never calls it in that state; it answers with an error if it is.
struct UnconfiguredTracker;

impl StatusTracker for UnconfiguredTracker {
    fn bulk_fetch(&self, _project: &str, _keys: &[String]) -> TrackerFuture<'_> {
        Box::pin(async {
            Err(TrackerError::Transport {
                message: "no tracker credential configured".into(),
            })
        })
    }
}
