//! Sine breathing engine.
//!
//! A breathing pass samples `sin(phase * π)²` at [`HZ`] and renders each
//! sample as a pulse within one sampling cycle. [`BreathCycle`] holds the
//! state of one pass; the engine ticks it from a periodic timer and restarts
//! it every `speed` for as long as a breathing effect lasts.

use crate::channel::{ChannelId, PulseChannel};
use crate::timer::TimerHandle;
use crate::types::EffectError;
use core::f32::consts::PI;

/// Sampling frequency of a breathing pass, in whole hertz.
pub const SAMPLE_RATE_HZ: u64 = 80;

/// Sampling frequency of a breathing pass.
pub const HZ: f32 = SAMPLE_RATE_HZ as f32;

/// Length of one sampling cycle in milliseconds (`1000 / HZ`).
pub const CYCLE_LENGTH_MS: f32 = 1000.0 / HZ;

/// Length of one sampling cycle in microseconds.
pub const CYCLE_LENGTH_US: u64 = 1_000_000 / SAMPLE_RATE_HZ;

/// Starting phase. `sin(0)` would request a zero-length pulse.
pub const PHASE_EPSILON: f32 = 0.001;

/// Lower bound of the saturation band, in milliseconds.
pub const SATURATION_LOW_MS: f32 = 12.470;

/// Upper bound of the saturation band, in milliseconds.
pub const SATURATION_HIGH_MS: f32 = 12.505;

/// What a single tick writes to the channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulseOutput {
    /// Line driven fully on. Pulses this close to the full cycle leave a
    /// visible dead gap, so they snap to solid.
    Solid,

    /// Pulse of the given length in milliseconds.
    Pulse(f32),
}

/// Progress of a [`BreathCycle`] after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleStatus {
    /// More ticks remain in this pass.
    Running,

    /// Phase reached 1; the pass is over.
    Complete,
}

/// Pulse length for `phase`, clamped to `0.0..=CYCLE_LENGTH_MS`.
#[inline]
pub fn pulse_duration(phase: f32) -> f32 {
    let s = libm::sinf(phase * PI);
    (s * s * CYCLE_LENGTH_MS).clamp(0.0, CYCLE_LENGTH_MS)
}

/// Output for `phase`, applying the saturation snap.
pub fn pulse_output(phase: f32) -> PulseOutput {
    let duration = pulse_duration(phase);

    if (SATURATION_LOW_MS..=SATURATION_HIGH_MS).contains(&duration) {
        PulseOutput::Solid
    } else {
        PulseOutput::Pulse(duration)
    }
}

/// State of one breathing pass.
///
/// Phase is recomputed from the tick count on every tick so long passes do
/// not accumulate rounding drift.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BreathCycle {
    step: f32,
    ticks: u32,
    phase: f32,
}

impl BreathCycle {
    /// Creates a pass lasting `speed_ms` milliseconds.
    ///
    /// # Errors
    /// * `InvalidSpeed` - `speed_ms` is zero, negative or not finite
    pub fn new(speed_ms: f32) -> Result<Self, EffectError> {
        if !speed_ms.is_finite() || speed_ms <= 0.0 {
            return Err(EffectError::InvalidSpeed);
        }

        Ok(Self {
            step: CYCLE_LENGTH_MS / speed_ms,
            ticks: 0,
            phase: PHASE_EPSILON,
        })
    }

    /// Rewinds the pass to its first tick.
    pub fn reset(&mut self) {
        self.ticks = 0;
        self.phase = PHASE_EPSILON;
    }

    /// Emits the current sample onto `channel` and advances the phase.
    ///
    /// Once complete, further ticks write nothing.
    pub fn tick<C: PulseChannel>(&mut self, channel: &mut C) -> CycleStatus {
        if self.is_complete() {
            return CycleStatus::Complete;
        }

        match pulse_output(self.phase) {
            PulseOutput::Solid => channel.write_level(true),
            PulseOutput::Pulse(duration) => channel.emit_pulse(duration),
        }

        self.ticks = self.ticks.saturating_add(1);
        self.phase = PHASE_EPSILON + self.ticks as f32 * self.step;

        if self.is_complete() {
            CycleStatus::Complete
        } else {
            CycleStatus::Running
        }
    }

    /// Current phase, starting at [`PHASE_EPSILON`].
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Number of ticks emitted so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Returns true once the phase reached 1.
    pub fn is_complete(&self) -> bool {
        self.phase >= 1.0
    }
}

/// A breathing effect bound to a channel: the current pass plus the timers
/// that tick it, restart it and end the effect.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BreathEffect {
    pub channel: ChannelId,
    pub cycle: BreathCycle,
    pub cycle_timer: Option<TimerHandle>,
    pub restart_timer: TimerHandle,
    pub stop_timer: TimerHandle,
}
