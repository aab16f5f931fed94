//! Replaying adapters that serve recorded interactions.

pub mod tracker;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cassette::replayer::CassetteReplayer;
use crate::error::TrackerError;

pub use tracker::ReplayingTracker;

/// Fetch the recorded output of the `port::method` call made with `input`.
pub(crate) fn recorded_output<I: Serialize>(
    replayer: &CassetteReplayer,
    port: &str,
    method: &str,
    input: &I,
) -> Result<serde_json::Value, TrackerError> {
    let input = serde_json::to_value(input).map_err(|e| TrackerError::Replay {
        message: format!("failed to serialize replay input: {e}"),
    })?;
    replayer
        .find_interaction(port, method, &input)
        .map(|interaction| interaction.output.clone())
        .map_err(|message| TrackerError::Replay { message })
}

/// Decode a recorded `{"Ok": v}` / `{"Err": msg}` output.
///
/// Mirror of `recording::record_result`. Recorded errors come back as
/// [`TrackerError::Replay`] carrying the original message.
pub(crate) fn replay_result<T: DeserializeOwned>(
    output: serde_json::Value,
) -> Result<T, TrackerError> {
    let mut map = match output {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(TrackerError::Replay {
                message: format!("recorded output is not an Ok/Err object: {other}"),
            })
        }
    };
    if let Some(ok) = map.remove("Ok") {
        return serde_json::from_value(ok).map_err(|e| TrackerError::Replay {
            message: format!("recorded Ok value has the wrong shape: {e}"),
        });
    }
    match map.remove("Err") {
        Some(serde_json::Value::String(message)) => Err(TrackerError::Replay { message }),
        Some(other) => Err(TrackerError::Replay {
            message: other.to_string(),
        }),
        None => Err(TrackerError::Replay {
            message: "recorded output has neither Ok nor Err".to_string(),
        }),
    }
}
