//! The bytecode tracker playback engine (C5, C6): per-channel command
//! interpreter plus the frame/pattern/tick cursor that drives it.

pub mod channel;
pub mod engine;
mod opcode;

pub use channel::TrackerChannel;
pub use engine::{StepOutcome, TrackerEngine};
