//! Engine-wide rate and layout constants.
//!
//! These mirror the `#define`s at the top of the original `apu.h`/`nsf.h`
//! (`APU_FREQ`, `NSF_FREQ`, `NSF_CHANNELS`, `NSF_SEQUENCES`) rather than a
//! runtime configuration object — nothing here needs to change once the
//! engine is built.

/// NES master clock rate in Hz. A period value is a count of these cycles.
pub const NES_CLOCK_HZ: u32 = 1_789_772;

/// Music driver (tracker) tick rate in Hz.
pub const MUSIC_TICK_HZ: u32 = 60;

/// Number of synthesised channels: square 1, square 2, triangle, noise.
pub const CHANNEL_COUNT: usize = 4;

/// Number of sequence runners per instrument: volume, arpeggio, pitch,
/// hi-pitch, duty.
pub const SEQUENCE_COUNT: usize = 5;

/// Index of each channel within the fixed `CHANNEL_COUNT`-sized arrays.
pub const SQUARE1: usize = 0;
pub const SQUARE2: usize = 1;
pub const TRIANGLE: usize = 2;
pub const NOISE: usize = 3;

/// Index of each sequence runner within a [`crate::tracker::channel::TrackerChannel`].
pub const SEQ_VOLUME: usize = 0;
pub const SEQ_ARPEGGIO: usize = 1;
pub const SEQ_PITCH: usize = 2;
pub const SEQ_HIPITCH: usize = 3;
pub const SEQ_DUTY: usize = 4;
