//! Error types.
//!
//! Parsing/start-up errors are fatal and surface to the caller (the
//! [`EngineError`] enum below). Playback-time anomalies (an unsupported
//! opcode, a period that falls out of range) are recovered locally per the
//! module's own rules and only ever reported through `log::warn!` — the
//! music must not stop because of them.

use thiserror::Error;

/// Fatal errors from module parsing or engine start-up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A 16-bit offset resolved outside the module's byte buffer.
    #[error("module offset {offset:#06x} escapes module bounds (len {len:#06x})")]
    InvalidModule { offset: usize, len: usize },

    /// `load()` was given a song index the song table doesn't have.
    #[error("song index {song} out of range ({count} songs)")]
    SongIndexOutOfRange { song: usize, count: usize },

    /// The host's [`crate::timer::TimerSource`] could not schedule a callback.
    #[error("timer source could not schedule a callback")]
    TimerUnavailable,
}
