//! Frame/pattern/tick cursor (spec.md §4.5-4.6). Drives the four tracker
//! channels once per 60 Hz music tick and reports back every channel's
//! reschedule action so the timing shell (§4.1's phase-tick timers) can be
//! kept in sync.
//!
//! Grounded on `original_source/source/nsf.cpp`'s `NSF::play`, which walks
//! the same three nested counters; restructured as an explicit state
//! machine the way the teacher threads CPU/PPU stepping through `bus.rs`.

use crate::channel::{Channel, Reschedule};
use crate::config::CHANNEL_COUNT;
use crate::error::EngineError;
use crate::module::Module;
use crate::tracker::channel::{Control, TrackerChannel};

/// Result of one [`TrackerEngine::step`] call.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    /// Per-channel reschedule action, to be applied to that channel's
    /// phase-tick timer by the caller.
    pub reschedules: [Reschedule; CHANNEL_COUNT],
    /// `true` once an `0x88` halt has fired; the caller should stop timers.
    pub halted: bool,
}

pub struct TrackerEngine {
    frame_table: usize,
    insts_table: usize,
    frame: u8,
    pattern: u8,
    tick: u8,
    frame_count: u8,
    pattern_count: u8,
    tick_count: u8,
    halted: bool,
}

impl TrackerEngine {
    /// Resolves song info for `song_index` and initialises the cursors
    /// (spec.md §4.6). `song_index` out of range is `InvalidModule`.
    pub fn load(module: &Module, song_index: u8) -> Result<Self, EngineError> {
        let song_table = module.lookup(0, 0)?;
        let song_info = module.lookup(song_table, song_index as usize).map_err(|_| {
            let count = module.len().saturating_sub(song_table) / 2;
            EngineError::SongIndexOutOfRange {
                song: song_index as usize,
                count,
            }
        })?;
        let insts_table = module.lookup(0, 1)?;
        let frame_table = module.lookup(song_info, 0)?;
        let frame_count = module.read_u8(song_info + 2)?;
        let pattern_count = module.read_u8(song_info + 3)?;
        let tick_count = module.read_u8(song_info + 4)?;

        Ok(Self {
            frame_table,
            insts_table,
            // Cursor and limit start equal, so the very first `step()`
            // immediately loads frame 0's patterns and execs row 0.
            frame: frame_count,
            pattern: pattern_count,
            tick: tick_count,
            frame_count,
            pattern_count,
            tick_count,
            halted: false,
        })
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Runs one music tick (spec.md §4.5).
    pub fn step(
        &mut self,
        module: &Module,
        channels: &mut [TrackerChannel; CHANNEL_COUNT],
        oscillators: &mut [Channel; CHANNEL_COUNT],
    ) -> Result<StepOutcome, EngineError> {
        let mut out = StepOutcome {
            reschedules: [Reschedule::None; CHANNEL_COUNT],
            halted: self.halted,
        };
        if self.halted {
            return Ok(out);
        }

        if self.tick == self.tick_count {
            self.tick = 0;
            if self.pattern == self.pattern_count {
                self.pattern = 0;
                if self.frame == self.frame_count {
                    self.frame = 0;
                }
                for idx in 0..CHANNEL_COUNT {
                    let frame_addr = module.lookup(self.frame_table, self.frame as usize)?;
                    let pattern_addr = module.lookup(frame_addr, idx)?;
                    channels[idx].frame(pattern_addr);
                }
                self.frame = self.frame.wrapping_add(1);
            }
            self.pattern = self.pattern.wrapping_add(1);

            for idx in 0..CHANNEL_COUNT {
                let outcome = channels[idx].exec(module, self.insts_table, &mut oscillators[idx])?;
                out.reschedules[idx] = outcome.reschedule;
                match outcome.control {
                    Control::None => {}
                    Control::Halt => {
                        self.halted = true;
                        out.halted = true;
                    }
                    Control::SetSpeed(speed) => {
                        self.tick = 0;
                        self.tick_count = speed;
                    }
                    Control::Jump(frame) => {
                        self.frame = frame;
                        self.pattern = self.pattern_count;
                    }
                    Control::SkipFrame => {
                        self.pattern = self.pattern_count;
                    }
                }
            }
        }

        self.tick = self.tick.wrapping_add(1);

        for idx in 0..CHANNEL_COUNT {
            let r = channels[idx].tick(&mut oscillators[idx]);
            if r != Reschedule::None {
                out.reschedules[idx] = r;
            }
            let seq_r = channels[idx].run_sequences(module, &mut oscillators[idx])?;
            if seq_r != Reschedule::None {
                out.reschedules[idx] = seq_r;
            }
        }

        Ok(out)
    }
}
