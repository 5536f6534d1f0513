//! The public engine facade (C7: timing shell). Owns the module, both
//! tracker and synthesis state, the mixer, and the host's DAC sink and
//! timer source, and turns two kinds of timer fire into the right calls
//! into C2/C5/C6.
//!
//! Grounded on the teacher's `Bus`/`Cpu` split in `bus.rs` (a struct that
//! owns every subsystem and exposes a small `step`-style surface), adapted
//! to a callback-driven rather than poll-driven shape per spec.md §5.

use crate::channel::{Channel, Noise, Reschedule, Square, Triangle};
use crate::config::{CHANNEL_COUNT, MUSIC_TICK_HZ, NES_CLOCK_HZ};
use crate::dac::DacSink;
use crate::error::EngineError;
use crate::mixer::Mixer;
use crate::module::Module;
use crate::timer::{TimerId, TimerSource};
use crate::tracker::{TrackerChannel, TrackerEngine};

fn default_oscillators() -> [Channel; CHANNEL_COUNT] {
    // Index order must match config::{SQUARE1,SQUARE2,TRIANGLE,NOISE}.
    [
        Channel::Square(Square::new()),
        Channel::Square(Square::new()),
        Channel::Triangle(Triangle::new()),
        Channel::Noise(Noise::new()),
    ]
}

/// Converts a channel period (NES cycles) to the microsecond interval a
/// [`TimerSource`] understands (spec.md §4.1, "period-to-time conversion").
fn period_to_interval_us(cycles: u32) -> u32 {
    ((cycles as u64 * 1_000_000) / NES_CLOCK_HZ as u64) as u32
}

/// The engine's public API surface (spec.md §6).
pub struct Player<'a, D: DacSink, T: TimerSource> {
    dac: D,
    timer: T,
    module: Option<Module<'a>>,
    tracker: Option<TrackerEngine>,
    tracker_channels: [TrackerChannel; CHANNEL_COUNT],
    oscillators: [Channel; CHANNEL_COUNT],
    mixer: Mixer,
    music_handle: Option<T::Handle>,
    channel_handles: [Option<T::Handle>; CHANNEL_COUNT],
    running: bool,
}

impl<'a, D: DacSink, T: TimerSource> Player<'a, D, T> {
    /// Constructs a stopped, unloaded engine against a DAC sink and a
    /// timer source supplied by the host.
    pub fn new(dac: D, timer: T) -> Self {
        Self {
            dac,
            timer,
            module: None,
            tracker: None,
            tracker_channels: [TrackerChannel::new(); CHANNEL_COUNT],
            oscillators: default_oscillators(),
            mixer: Mixer::new(),
            music_handle: None,
            channel_handles: [None; CHANNEL_COUNT],
            running: false,
        }
    }

    /// Parses module header, resolves song info, and resets every channel
    /// to a known state (spec.md §4.6). Does not start playback.
    pub fn load(&mut self, bytes: &'a [u8], song_index: u8) -> Result<(), EngineError> {
        if self.running {
            self.stop();
        }
        let module = Module::new(bytes);
        let tracker = TrackerEngine::load(&module, song_index)?;
        self.tracker_channels = [TrackerChannel::new(); CHANNEL_COUNT];
        self.oscillators = default_oscillators();
        self.module = Some(module);
        self.tracker = Some(tracker);
        Ok(())
    }

    /// Begins playback: arms the 60 Hz music timer. Idempotent — calling
    /// while already running cancels prior timers first.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.running {
            self.stop();
        }
        let interval_us = 1_000_000 / MUSIC_TICK_HZ;
        let handle = self
            .timer
            .schedule_periodic(interval_us, TimerId::Music)
            .ok_or(EngineError::TimerUnavailable)?;
        self.music_handle = Some(handle);
        self.running = true;
        Ok(())
    }

    /// Ends playback: cancels both timer sources and disables every
    /// channel (spec.md §5).
    pub fn stop(&mut self) {
        if let Some(handle) = self.music_handle.take() {
            self.timer.cancel(handle);
        }
        for slot in &mut self.channel_handles {
            if let Some(handle) = slot.take() {
                self.timer.cancel(handle);
            }
        }
        for channel in &mut self.oscillators {
            channel.disable();
        }
        self.running = false;
    }

    /// The last mixed 6-bit sample (spec.md §6, for instrumentation/test).
    pub fn output(&self) -> u8 {
        self.mixer.output()
    }

    /// Dispatches one timer fire. `id` identifies which of the engine's
    /// periodic callbacks fired — the music tick or one channel's phase
    /// tick (spec.md §5).
    pub fn on_timer(&mut self, id: TimerId) {
        match id {
            TimerId::Music => self.on_music_tick(),
            TimerId::Channel(idx) => self.on_phase_tick(idx),
        }
    }

    fn on_music_tick(&mut self) {
        let (Some(module), Some(tracker)) = (self.module.as_ref(), self.tracker.as_mut()) else {
            return;
        };
        match tracker.step(module, &mut self.tracker_channels, &mut self.oscillators) {
            Ok(outcome) => {
                for idx in 0..CHANNEL_COUNT {
                    self.apply_reschedule(idx, outcome.reschedules[idx]);
                }
                if outcome.halted {
                    self.stop();
                }
            }
            Err(err) => log::warn!("tracker step failed: {err}"),
        }
    }

    fn on_phase_tick(&mut self, idx: usize) {
        let Some(oscillator) = self.oscillators.get_mut(idx) else {
            return;
        };
        let reschedule = oscillator.phase_tick();
        let outputs = [
            self.oscillators[0].output(),
            self.oscillators[1].output(),
            self.oscillators[2].output(),
            self.oscillators[3].output(),
        ];
        self.mixer.mix(outputs, &mut self.dac);
        self.apply_reschedule(idx, reschedule);
    }

    fn apply_reschedule(&mut self, idx: usize, reschedule: Reschedule) {
        match reschedule {
            Reschedule::None => {}
            Reschedule::Cancel => {
                if let Some(handle) = self.channel_handles[idx].take() {
                    self.timer.cancel(handle);
                }
            }
            Reschedule::Immediate(cycles) => {
                if let Some(handle) = self.channel_handles[idx].take() {
                    self.timer.cancel(handle);
                }
                let interval_us = period_to_interval_us(cycles);
                match self.timer.schedule_periodic(interval_us, TimerId::Channel(idx)) {
                    Some(handle) => self.channel_handles[idx] = Some(handle),
                    None => log::warn!("timer unavailable, channel {idx} silenced"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dac::NullDac;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Handle(u32);

    #[derive(Default)]
    struct FakeTimer {
        scheduled: Rc<RefCell<HashMap<u32, (u32, TimerId)>>>,
        next: u32,
    }

    impl TimerSource for FakeTimer {
        type Handle = Handle;

        fn schedule_periodic(&mut self, interval_us: u32, id: TimerId) -> Option<Self::Handle> {
            let handle = self.next;
            self.next += 1;
            self.scheduled.borrow_mut().insert(handle, (interval_us, id));
            Some(Handle(handle))
        }

        fn cancel(&mut self, handle: Self::Handle) {
            self.scheduled.borrow_mut().remove(&handle.0);
        }
    }

    fn tiny_module() -> Vec<u8> {
        // root: lookup(0,0) -> song_table @4, lookup(0,1) -> insts_table @6
        // song_table: one song, lookup(4,0) -> song_info @10
        // insts_table: empty (no instruments referenced by this pattern)
        // song_info: [frame_table_lo, frame_table_hi, frame_count, pattern_count, tick_count]
        // frame_table @16: one frame entry offset -> @20
        // frame entry @20: 4 channel pattern offsets -> all point to @30 (shared halt pattern)
        // pattern @30: 0x88 (halt)
        let mut m = vec![0u8; 40];
        m[0..2].copy_from_slice(&4u16.to_le_bytes()); // root[0] -> song table
        m[2..4].copy_from_slice(&6u16.to_le_bytes()); // root[1] -> insts table
        m[4..6].copy_from_slice(&10u16.to_le_bytes()); // song_table[0] -> song info
        m[10..12].copy_from_slice(&16u16.to_le_bytes()); // song_info[0] -> frame table
        m[12] = 0; // frame_count
        m[13] = 0; // pattern_count
        m[14] = 0; // tick_count
        m[16..18].copy_from_slice(&20u16.to_le_bytes()); // frame_table[0] -> frame entry
        for c in 0..4 {
            let off = 20 + c * 2;
            m[off..off + 2].copy_from_slice(&30u16.to_le_bytes());
        }
        m[30] = 0x88; // halt
        m
    }

    #[test]
    fn start_arms_music_timer() {
        let module = tiny_module();
        let mut player = Player::new(NullDac::new(), FakeTimer::default());
        player.load(&module, 0).unwrap();
        player.start().unwrap();
        assert!(player.music_handle.is_some());
    }

    #[test]
    fn halt_opcode_stops_playback() {
        let module = tiny_module();
        let mut player = Player::new(NullDac::new(), FakeTimer::default());
        player.load(&module, 0).unwrap();
        player.start().unwrap();
        player.on_timer(TimerId::Music);
        assert!(!player.running);
        assert!(player.music_handle.is_none());
    }

    #[test]
    fn load_with_bad_song_index_is_out_of_range() {
        let module = tiny_module();
        let mut player = Player::new(NullDac::new(), FakeTimer::default());
        assert!(matches!(
            player.load(&module, 100),
            Err(EngineError::SongIndexOutOfRange { .. })
        ));
    }
}
