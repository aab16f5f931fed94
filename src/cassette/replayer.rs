//! Replays recorded interactions from a cassette.

use std::collections::HashMap;

use super::format::{Cassette, Interaction};

/// Key for indexing interactions by port and method.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct PortMethodKey {
    port: String,
    method: String,
}

/// Answers port calls from a loaded cassette by matching their input.
///
/// Lookups do not consume interactions, so the same request can be replayed
/// any number of times and the answer never depends on call order.
#[derive(Debug)]
pub struct CassetteReplayer {
    recorded: HashMap<PortMethodKey, Vec<Interaction>>,
}

impl CassetteReplayer {
    /// Create a new replayer from a loaded cassette.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut recorded: HashMap<PortMethodKey, Vec<Interaction>> = HashMap::new();
        for interaction in &cassette.interactions {
            let key = PortMethodKey {
                port: interaction.port.clone(),
                method: interaction.method.clone(),
            };
            recorded.entry(key).or_default().push(interaction.clone());
        }
        Self { recorded }
    }

    /// Return the interaction recorded for `port::method` with this `input`.
    ///
    /// When the same input was recorded more than once, the latest wins.
    ///
    /// # Errors
    ///
    /// Returns a descriptive message if nothing was recorded for the given
    /// port/method combination and input.
    pub fn find_interaction(
        &self,
        port: &str,
        method: &str,
        input: &serde_json::Value,
    ) -> Result<&Interaction, String> {
        let key = PortMethodKey {
            port: port.to_string(),
            method: method.to_string(),
        };

        let Some(recorded) = self.recorded.get(&key) else {
            let mut available: Vec<String> = self
                .recorded
                .keys()
                .map(|k| format!("{}::{}", k.port, k.method))
                .collect();
            available.sort();
            return Err(format!(
                "Cassette has no interactions recorded for port={port:?} method={method:?}. \
                 Available port::method pairs: [{}]",
                available.join(", ")
            ));
        };

        recorded
            .iter()
            .rev()
            .find(|interaction| interaction.input == *input)
            .ok_or_else(|| {
                format!(
                    "Cassette has no {port}::{method} interaction with input {input} \
                     ({count} recorded for other inputs)",
                    count = recorded.len(),
                )
            })
    }
}
