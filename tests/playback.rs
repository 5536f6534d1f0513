//! End-to-end playback tests against the public [`apu2a03::Player`] API,
//! using a small hand-built module fixture the way the teacher's `rom.rs`
//! builds a minimal iNES header for CPU/PPU integration tests.

use apu2a03::dac::NullDac;
use apu2a03::{EngineError, Player, TimerId, TimerSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Handle(u32);

/// A timer source that schedules nothing for real — tests fire [`TimerId`]s
/// into [`Player::on_timer`] directly instead of waiting on a clock.
#[derive(Default)]
struct ManualTimer {
    next: u32,
}

impl TimerSource for ManualTimer {
    type Handle = Handle;

    fn schedule_periodic(&mut self, _interval_us: u32, _id: TimerId) -> Option<Self::Handle> {
        let handle = self.next;
        self.next += 1;
        Some(Handle(handle))
    }

    fn cancel(&mut self, _handle: Self::Handle) {}
}

/// Builds a module with one song, one frame, and one pattern: square 1
/// plays note 48 (spec.md S1/S4) for 5 rows, the other three channels rest.
fn note_on_module() -> Vec<u8> {
    let mut m = vec![0u8; 30];
    m[0..2].copy_from_slice(&4u16.to_le_bytes()); // root[0] -> song table
    m[2..4].copy_from_slice(&6u16.to_le_bytes()); // root[1] -> instrument table (unused)
    m[4..6].copy_from_slice(&8u16.to_le_bytes()); // song_table[0] -> song info
    m[8..10].copy_from_slice(&13u16.to_le_bytes()); // song_info[0] -> frame table
    m[10] = 0; // frame_count - 1
    m[11] = 0; // pattern_count - 1
    m[12] = 0; // tick_count - 1
    m[13..15].copy_from_slice(&15u16.to_le_bytes()); // frame_table[0] -> frame entry
    m[15..17].copy_from_slice(&23u16.to_le_bytes()); // frame[square1] -> note-on pattern
    m[17..19].copy_from_slice(&26u16.to_le_bytes()); // frame[square2] -> rest pattern
    m[19..21].copy_from_slice(&26u16.to_le_bytes()); // frame[triangle] -> rest pattern
    m[21..23].copy_from_slice(&26u16.to_le_bytes()); // frame[noise] -> rest pattern
    m[23] = 0x31; // note-on, semitone 48 (A4)
    m[24] = 0x05; // row delay
    m[26] = 0x00; // rest
    m[27] = 0xFF; // row delay
    m
}

#[test]
fn note_on_drives_square_output_through_mixer() {
    let _ = env_logger::builder().is_test(true).try_init();
    let module = note_on_module();
    let mut player = Player::new(NullDac::new(), ManualTimer::default());
    player.load(&module, 0).unwrap();
    player.start().unwrap();

    // The music tick executes the note-on row and arms square 1's phase timer.
    player.on_timer(TimerId::Music);
    assert_eq!(player.output(), 0, "no phase tick has fired yet");

    // Square duty 0: {0,1,0,0,0,0,0,0} * volume 15, channel index 0 (square 1).
    player.on_timer(TimerId::Channel(0));
    assert_eq!(player.output(), 0);
    player.on_timer(TimerId::Channel(0));
    assert_eq!(player.output(), 15);
}

#[test]
fn stop_silences_a_running_channel() {
    let module = note_on_module();
    let mut player = Player::new(NullDac::new(), ManualTimer::default());
    player.load(&module, 0).unwrap();
    player.start().unwrap();
    player.on_timer(TimerId::Music);
    player.on_timer(TimerId::Channel(0));
    player.on_timer(TimerId::Channel(0));
    assert_eq!(player.output(), 15);

    player.stop();
    player.on_timer(TimerId::Channel(0));
    assert_eq!(player.output(), 0);
}

#[test]
fn load_rejects_a_song_index_the_table_does_not_reach() {
    let module = note_on_module();
    let mut player = Player::new(NullDac::new(), ManualTimer::default());
    assert!(matches!(
        player.load(&module, 255),
        Err(EngineError::SongIndexOutOfRange { .. })
    ));
}

#[test]
fn reloading_a_running_player_resets_channel_state() {
    let module = note_on_module();
    let module2 = note_on_module();
    let mut player = Player::new(NullDac::new(), ManualTimer::default());
    player.load(&module, 0).unwrap();
    player.start().unwrap();
    player.on_timer(TimerId::Music);
    player.on_timer(TimerId::Channel(0));
    player.on_timer(TimerId::Channel(0));
    assert_eq!(player.output(), 15);

    // A fresh load resets every channel to its disabled default, even
    // while a previous song was mid-playback.
    player.load(&module2, 0).unwrap();
    assert_eq!(player.output(), 15, "output() isn't cleared until the next mix");
    player.on_timer(TimerId::Channel(0));
    assert_eq!(player.output(), 0, "freshly loaded channels start disabled");
}
