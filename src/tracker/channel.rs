//! Per-channel tracker interpreter: row commands (exec, §4.4.3), the
//! 60 Hz effect/sequence tick (§4.4.4), and sequence loading (§4.4.2).
//!
//! Grounded on `original_source/source/channel.cpp`'s `Channel::exec` and
//! `Channel::clock`, restructured the way the teacher splits CPU opcode
//! dispatch from per-instruction execution in `cpu.rs` (a `match` over a
//! byte with explicit argument consumption, not a jump table).

use crate::channel::{Channel, Reschedule};
use crate::config::*;
use crate::error::EngineError;
use crate::module::Module;
use crate::tracker::opcode;

/// One loaded sequence's read cursor into the module blob. `count == 0`
/// means the slot is inactive (spec.md §4.4.2: mask bit clear).
#[derive(Debug, Clone, Copy, Default)]
struct SequenceRunner {
    data_addr: usize,
    count: u8,
    repeat: u8,
    tick: u8,
}

impl SequenceRunner {
    fn is_active(&self) -> bool {
        self.count > 0
    }

    /// Applies `data[tick]` via `apply` and advances, wrapping to `repeat`
    /// once the data runs out (spec.md §4.4.4 step 6).
    fn step(&mut self, module: &Module, mut apply: impl FnMut(u8)) -> Result<(), EngineError> {
        if !self.is_active() {
            return Ok(());
        }
        if self.tick < self.count {
            let value = module.read_u8(self.data_addr + self.tick as usize)?;
            apply(value);
            self.tick += 1;
        } else if self.repeat != 0xFF {
            self.tick = self.repeat;
        }
        Ok(())
    }
}

/// Signal raised by a row command that the tracker engine (not this
/// channel) must act on: changing the frame/pattern cursor, the engine
/// speed, or halting altogether.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Control {
    #[default]
    None,
    /// Jump to frame `n` (spec.md `0x84`).
    Jump(u8),
    /// Force the end of the current pattern without changing frame
    /// (spec.md `0x86`).
    SkipFrame,
    /// Halt the engine (spec.md `0x88`).
    Halt,
    /// Set `tick_count` (spec.md `0x82`).
    SetSpeed(u8),
}

/// What a row of command bytes asked for: the channel's own reschedule
/// action plus any engine-wide control signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOutcome {
    pub reschedule: Reschedule,
    pub control: Control,
}

/// Per-channel tracker state (spec.md §3).
#[derive(Clone, Copy)]
pub struct TrackerChannel {
    cmds: usize,
    enabled: bool,
    note: u8,
    base_volume: u8,
    pitch_offset: i16,
    delay: u8,
    pdelay: u8,
    cut: u8,
    sweep: u8,
    sweep_div: u8,
    arpeggio: u8,
    arp_count: u8,
    port: u8,
    /// Fixed glide target for `0x8E`/`0x90` (automatic up/down portamento);
    /// `None` means "glide toward `to_period(note)`" (`0x8C`, plain portamento).
    port_target: Option<u16>,
    slide: u8,
    slide_target: u16,
    seq: [SequenceRunner; SEQUENCE_COUNT],
}

impl Default for TrackerChannel {
    fn default() -> Self {
        Self {
            cmds: 0,
            enabled: false,
            note: 0,
            base_volume: 0xF,
            pitch_offset: 0,
            delay: 0,
            pdelay: 0xFF,
            cut: 0,
            sweep: 0,
            sweep_div: 0,
            arpeggio: 0,
            arp_count: 0,
            port: 0,
            port_target: None,
            slide: 0,
            slide_target: 0,
            seq: [SequenceRunner::default(); SEQUENCE_COUNT],
        }
    }
}

impl TrackerChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets per-frame cursor state (spec.md §4.4.1). Sequence state
    /// survives frame boundaries; only a new instrument resets it.
    pub fn frame(&mut self, cursor: usize) {
        self.cmds = cursor;
        self.delay = 0;
        self.pdelay = 0xFF;
    }

    /// Loads the five sequence runners from an instrument entry at
    /// `inst_cursor` (spec.md §4.4.2).
    pub fn sequence(&mut self, module: &Module, inst_cursor: usize, osc: &mut Channel) -> Result<(), EngineError> {
        let mask = module.read_u8(inst_cursor)?;
        let offsets_addr = inst_cursor + 1;
        let mut slot_index = 0usize;
        for i in 0..SEQUENCE_COUNT {
            if mask & (1 << i) != 0 {
                let record_addr = module.lookup(offsets_addr, slot_index)?;
                let count = module.read_u8(record_addr)?;
                let repeat = module.read_u8(record_addr + 1)?;
                self.seq[i] = SequenceRunner {
                    data_addr: record_addr + 4,
                    count,
                    repeat,
                    tick: 0,
                };
                slot_index += 1;
            } else {
                self.seq[i] = SequenceRunner::default();
            }
        }
        osc.pitch(0);
        osc.duty(0);
        Ok(())
    }

    fn reset_sequence_ticks(&mut self) {
        for runner in &mut self.seq {
            runner.tick = 0;
        }
    }

    /// Executes row commands until a note/rest is consumed, then resolves
    /// the row delay (spec.md §4.4.3).
    pub fn exec(&mut self, module: &Module, insts_addr: usize, osc: &mut Channel) -> Result<ExecOutcome, EngineError> {
        if self.delay > 0 {
            self.delay -= 1;
            return Ok(ExecOutcome::default());
        }

        let mut outcome = ExecOutcome::default();
        loop {
            let cmd = module.read_u8(self.cmds)?;
            self.cmds += 1;

            if cmd == opcode::REST {
                break;
            }
            if opcode::is_note_on(cmd) {
                let note = cmd - 1;
                self.note_on(note, osc, &mut outcome.reschedule);
                break;
            }
            match cmd {
                opcode::NOTE_OFF => {
                    outcome.reschedule = osc.disable();
                    self.enabled = false;
                    break;
                }
                opcode::SET_INSTRUMENT => {
                    let inst = self.read_arg(module)?;
                    let inst_cursor = module.lookup(insts_addr, inst as usize)?;
                    self.sequence(module, inst_cursor, osc)?;
                }
                opcode::SET_SPEED => {
                    let speed = self.read_arg(module)?;
                    outcome.control = Control::SetSpeed(speed);
                }
                opcode::JUMP => {
                    let frame = self.read_arg(module)?;
                    self.pdelay = 1;
                    outcome.control = Control::Jump(frame);
                    break;
                }
                opcode::SKIP_FRAME => {
                    let _ = self.read_arg(module)?;
                    self.pdelay = 1;
                    outcome.control = Control::SkipFrame;
                    break;
                }
                opcode::HALT => {
                    outcome.control = Control::Halt;
                    break;
                }
                opcode::SET_VOLUME => {
                    self.base_volume = self.read_arg(module)?;
                    osc.volume(self.base_volume);
                }
                opcode::PORTAMENTO => {
                    self.port = self.read_arg(module)?;
                    self.port_target = None;
                    self.slide = 0;
                }
                opcode::PORTAMENTO_UP => {
                    self.port = self.read_arg(module)?;
                    self.port_target = Some(opcode::PORTAMENTO_UP_TARGET);
                }
                opcode::PORTAMENTO_DOWN => {
                    self.port = self.read_arg(module)?;
                    self.port_target = Some(opcode::PORTAMENTO_DOWN_TARGET);
                }
                opcode::SWEEP => {
                    self.sweep = self.read_arg(module)?;
                    self.sweep_div = (self.sweep >> 4) & 0x7;
                    self.note_on(self.note, osc, &mut outcome.reschedule);
                }
                opcode::ARPEGGIO => {
                    self.arpeggio = self.read_arg(module)?;
                    self.arp_count = 0;
                }
                opcode::PITCH => {
                    let arg = self.read_arg(module)?;
                    self.pitch_offset = arg as i16 - 0x80;
                    osc.pitch(self.pitch_offset);
                }
                opcode::SET_DUTY => {
                    osc.duty(self.read_arg(module)?);
                }
                opcode::SLIDE_UP | opcode::SLIDE_DOWN => {
                    let arg = self.read_arg(module)?;
                    let semitones = arg & 0xF;
                    self.slide = 2 * (arg >> 4) + 1;
                    let target_note = if cmd == opcode::SLIDE_UP {
                        self.note.saturating_add(semitones)
                    } else {
                        self.note.saturating_sub(semitones)
                    };
                    self.slide_target = osc.period_for_note(target_note).unwrap_or(osc.get_period());
                }
                opcode::NOTE_CUT => {
                    self.cut = self.read_arg(module)?;
                }
                opcode::SET_PDELAY => {
                    self.pdelay = self.read_arg(module)?;
                }
                opcode::CLEAR_PDELAY => {
                    self.pdelay = 0xFF;
                }
                cmd if opcode::is_inline_instrument(cmd) => {
                    let inst_cursor = module.lookup(insts_addr, (cmd & 0xF) as usize)?;
                    self.sequence(module, inst_cursor, osc)?;
                }
                cmd if opcode::is_inline_volume(cmd) => {
                    self.base_volume = cmd & 0xF;
                    osc.volume(self.base_volume);
                }
                cmd if opcode::is_reserved(cmd) => {
                    let _ = self.read_arg(module)?;
                    log::debug!("unsupported opcode {cmd:#04x}, argument consumed");
                }
                other => {
                    log::warn!("unrecognised tracker opcode {other:#04x}, pattern stream likely desynced");
                }
            }
        }

        let row_delay = if self.pdelay == 0xFF {
            self.read_arg(module)?
        } else {
            self.pdelay
        };
        self.delay = row_delay;

        Ok(outcome)
    }

    fn read_arg(&mut self, module: &Module) -> Result<u8, EngineError> {
        let byte = module.read_u8(self.cmds)?;
        self.cmds += 1;
        Ok(byte)
    }

    fn note_on(&mut self, note: u8, osc: &mut Channel, reschedule: &mut Reschedule) {
        let was_disabled = !self.enabled;
        self.note = note;
        if self.port == 0 || was_disabled {
            self.pitch_offset = 0;
            osc.pitch(0);
            *reschedule = osc.note(note);
        }
        self.reset_sequence_ticks();
        self.enabled = true;
    }

    /// Runs one 60 Hz effect/sequence tick for this channel (spec.md §4.4.4).
    pub fn tick(&mut self, osc: &mut Channel) -> Reschedule {
        let mut reschedule = Reschedule::None;

        if self.cut > 0 {
            self.cut -= 1;
            if self.cut == 0 {
                reschedule = osc.disable();
                self.enabled = false;
            }
        }

        if self.sweep != 0 {
            self.sweep_div = self.sweep_div.wrapping_sub(1);
            if self.sweep_div == 0 {
                let period = osc.get_period() as i32;
                let shift = (self.sweep & 0x7) as i32;
                let negative = self.sweep & 0x8 != 0;
                let delta = period >> shift;
                let target = if negative { period - delta } else { period + delta };
                if !(8..=0x7FF).contains(&target) {
                    reschedule = osc.disable();
                    self.enabled = false;
                    self.sweep = 0;
                } else {
                    reschedule = osc.adjust_period(target as u16);
                }
                self.sweep_div = (self.sweep >> 4) & 0x7;
            }
        }

        if self.arpeggio != 0 {
            let high = (self.arpeggio >> 4) & 0xF;
            let low = self.arpeggio & 0xF;
            let offset = if high == 0 {
                [0u8, low][self.arp_count as usize % 2]
            } else {
                [0u8, high, low][self.arp_count as usize % 3]
            };
            let steps = if high == 0 { 2 } else { 3 };
            self.arp_count = (self.arp_count + 1) % steps;
            reschedule = osc.note(self.note.wrapping_add(offset));
        }

        if self.slide != 0 {
            reschedule = self.drive_toward(osc, self.slide_target, self.slide);
            if osc.get_period() == self.slide_target {
                self.slide = 0;
            }
        } else if self.port != 0 {
            let target = self
                .port_target
                .or_else(|| osc.period_for_note(self.note))
                .unwrap_or_else(|| osc.get_period());
            reschedule = self.drive_toward(osc, target, self.port);
            if osc.get_period() == target {
                self.port = 0;
                self.port_target = None;
            }
        }

        reschedule
    }

    /// Moves the oscillator's period toward `target` by `rate` units,
    /// clamping on crossing (spec.md §4.4.4 steps 4-5; the ambiguity note
    /// in §9 resolves the portamento-down comparison as `period < target`).
    fn drive_toward(&self, osc: &mut Channel, target: u16, rate: u8) -> Reschedule {
        let period = osc.get_period() as i32;
        let target = target as i32;
        let rate = rate as i32;
        let next = if period < target {
            (period + rate).min(target)
        } else {
            (period - rate).max(target)
        };
        osc.adjust_period(next as u16)
    }

    /// Runs the five instrument sequences in order (spec.md §4.4.4 step 6).
    pub fn run_sequences(&mut self, module: &Module, osc: &mut Channel) -> Result<Reschedule, EngineError> {
        if !self.enabled {
            return Ok(Reschedule::None);
        }
        let mut reschedule = Reschedule::None;
        let base_volume = self.base_volume;
        let note = self.note;

        self.seq[SEQ_VOLUME].step(module, |data| osc.volume((base_volume as u16 * data as u16 / 15) as u8))?;
        self.seq[SEQ_ARPEGGIO].step(module, |data| {
            reschedule = osc.note(note.wrapping_add(data));
        })?;
        self.seq[SEQ_PITCH].step(module, |data| osc.pitch(-(data as i16)))?;
        self.seq[SEQ_HIPITCH].step(module, |data| osc.pitch(-16 * data as i16))?;
        self.seq[SEQ_DUTY].step(module, |data| osc.duty(data))?;

        Ok(reschedule)
    }
}
