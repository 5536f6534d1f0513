//! The periodic scheduler a host provides. A concrete timer is out of scope
//! (spec.md §1); [`TimerSource`] is the abstract capability [`crate::engine`]
//! consumes. See [`crate::host::SpinSleepTimer`] (feature `host`) for a
//! concrete std implementation grounded on the teacher's own `Timer`.

/// Identifies which of the engine's periodic callbacks a scheduled timer
/// fire corresponds to, so one `TimerSource` impl can multiplex all five
/// (one music tick plus one phase tick per channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// The 60 Hz tracker tick.
    Music,
    /// A channel's phase tick, identified by its index into `config::CHANNEL_COUNT`.
    Channel(usize),
}

/// A periodic callback dispatcher. The host's real-time scheduler fires
/// `id` back into [`crate::engine::Player::on_timer`] every `interval_us`
/// microseconds until [`TimerSource::cancel`] is called on the handle it
/// returned.
pub trait TimerSource {
    /// Opaque handle identifying one scheduled callback.
    type Handle: Copy;

    /// Schedules `id` to fire every `interval_us` microseconds. Returns
    /// `None` if the host cannot currently schedule (all hardware timers
    /// in use, etc.) — this maps to [`crate::error::EngineError::TimerUnavailable`].
    fn schedule_periodic(&mut self, interval_us: u32, id: TimerId) -> Option<Self::Handle>;

    /// Cancels a previously scheduled callback. Cancelling an already-
    /// cancelled or unknown handle is a no-op.
    fn cancel(&mut self, handle: Self::Handle);
}
