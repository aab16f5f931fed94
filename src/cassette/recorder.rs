//! Records tracker interactions into a cassette file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use super::format::{Cassette, Interaction};

/// Serialises read-merge-write cycles of every recorder in the process.
static SAVE_LOCK: Mutex<()> = Mutex::new(());

/// Accumulates interactions and writes them as a YAML cassette file.
///
/// Saving merges with the cassette already at the path, so several recorders
/// (one per test, say) can share a file without losing each other's work.
#[derive(Debug)]
pub struct CassetteRecorder {
    path: PathBuf,
    name: String,
    commit: String,
    interactions: Vec<Interaction>,
}

impl CassetteRecorder {
    /// Create a new recorder that will write to the given path.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            commit: commit.into(),
            interactions: Vec::new(),
        }
    }

    /// Record an interaction, replacing an earlier one with the same input.
    ///
    /// The `seq` field is assigned automatically.
    pub fn record(
        &mut self,
        port: impl Into<String>,
        method: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
    ) {
        let interaction = Interaction {
            seq: 0,
            port: port.into(),
            method: method.into(),
            input,
            output,
        };
        self.interactions.retain(|i| !i.same_request(&interaction));
        self.interactions.push(interaction);
        renumber(&mut self.interactions);
    }

    /// Interactions recorded so far.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Merge everything recorded so far into the cassette file.
    ///
    /// Interactions already on disk are kept unless this recorder holds a
    /// newer answer for the same request. Parent directories are created as
    /// needed. May be called repeatedly.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing cassette cannot be parsed or the file
    /// cannot be written.
    pub fn save(&self) -> Result<&Path, std::io::Error> {
        let _guard = SAVE_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut interactions = if self.path.exists() {
            Cassette::load(&self.path)
                .map_err(std::io::Error::other)?
                .interactions
        } else {
            Vec::new()
        };
        interactions.retain(|old| !self.interactions.iter().any(|new| new.same_request(old)));
        interactions.extend(self.interactions.iter().cloned());
        renumber(&mut interactions);

        let cassette = Cassette {
            name: self.name.clone(),
            recorded_at: Utc::now(),
            commit: self.commit.clone(),
            interactions,
        };
        let yaml = serde_yaml::to_string(&cassette).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, yaml)?;
        Ok(&self.path)
    }

    /// Finish recording and write the cassette YAML file to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn finish(self) -> Result<PathBuf, std::io::Error> {
        self.save()?;
        Ok(self.path)
    }
}

fn renumber(interactions: &mut [Interaction]) {
    for (seq, interaction) in (0..).zip(interactions.iter_mut()) {
        interaction.seq = seq;
    }
}
