//! NES 2A03 waveform synthesis and FamiTracker-compatible tracker playback.
//!
//! The crate is split into a synthesis side (`tables`, `channel`, `mixer`)
//! that turns channel state into a 6-bit amplitude sample, and a tracker
//! side (`module`, `tracker`) that walks a packed binary module and drives
//! the synthesis side one command at a time. `timer` and `dac` are the
//! abstract capabilities a host (bare-metal or otherwise) must supply;
//! `engine` wires everything together behind the public `Player` API.

pub mod channel;
pub mod config;
pub mod dac;
pub mod engine;
pub mod error;
pub mod mixer;
pub mod module;
pub mod tables;
pub mod timer;
pub mod tracker;

#[cfg(feature = "host")]
pub mod host;

pub use dac::DacSink;
pub use engine::Player;
pub use error::EngineError;
pub use timer::{TimerId, TimerSource};
