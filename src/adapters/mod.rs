//! Adapters implementing the tracker port.
//!
//! `live` talks to Jira, `recording` wraps another tracker and captures its
//! responses to a cassette, and `replaying` serves a cassette back.

pub mod live;
pub mod recording;
pub mod replaying;
