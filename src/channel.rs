//! Output line abstraction.
//!
//! Defines the [`PulseChannel`] trait the effects drive, the [`ChannelId`]
//! used to address a channel inside an engine, and [`PwmPulseChannel`], an
//! adapter for any `embedded-hal` PWM output.

use crate::breath::CYCLE_LENGTH_MS;
use embedded_hal::pwm::SetDutyCycle;

/// An identifier for a channel within an engine.
///
/// Channels are indexed by their position in the array handed to
/// [`EffectEngine::new`](crate::EffectEngine::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(pub usize);

impl From<usize> for ChannelId {
    fn from(id: usize) -> Self {
        ChannelId(id)
    }
}

impl From<ChannelId> for usize {
    fn from(id: ChannelId) -> Self {
        id.0
    }
}

/// Trait for abstracting a single LED output line.
///
/// Implement this for your hardware (GPIO with a pulse timer, PWM, etc.).
/// Handle any hardware errors internally - these methods cannot fail.
pub trait PulseChannel {
    /// Drives the line fully on or fully off. Must be idempotent.
    fn write_level(&mut self, on: bool);

    /// Asserts the line for `duration_ms` within the current 12.5 ms sampling
    /// period, approximating an analog intensity.
    ///
    /// The engine only passes values in `0.0..=CYCLE_LENGTH_MS`.
    fn emit_pulse(&mut self, duration_ms: f32);
}

/// [`PulseChannel`] backed by a PWM output.
///
/// A pulse of `d` ms is rendered as a duty cycle of `d / 12.5`, which the PWM
/// peripheral holds until the next tick replaces it.
pub struct PwmPulseChannel<P: SetDutyCycle> {
    pwm: P,
    max_duty: u16,
    active_low: bool,
}

impl<P: SetDutyCycle> PwmPulseChannel<P> {
    /// Wraps a PWM output.
    ///
    /// # Arguments
    /// * `pwm` - PWM channel driving the LED
    /// * `active_low` - true when the LED lights on a low output (common anode)
    pub fn new(pwm: P, active_low: bool) -> Self {
        let max_duty = pwm.max_duty_cycle();

        Self {
            pwm,
            max_duty,
            active_low,
        }
    }

    /// Releases the underlying PWM output.
    pub fn into_inner(self) -> P {
        self.pwm
    }

    fn duty_for(&self, fraction: f32) -> u16 {
        let duty = (fraction.clamp(0.0, 1.0) * self.max_duty as f32) as u16;

        if self.active_low {
            self.max_duty - duty
        } else {
            duty
        }
    }
}

impl<P: SetDutyCycle> PulseChannel for PwmPulseChannel<P> {
    fn write_level(&mut self, on: bool) {
        let duty = self.duty_for(if on { 1.0 } else { 0.0 });
        let _ = self.pwm.set_duty_cycle(duty);
    }

    fn emit_pulse(&mut self, duration_ms: f32) {
        let duty = self.duty_for(duration_ms / CYCLE_LENGTH_MS);
        let _ = self.pwm.set_duty_cycle(duty);
    }
}
