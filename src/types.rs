//! Core types shared by the effects and the engine.

use crate::channel::ChannelId;

/// Default toggle period of a blink, in milliseconds.
pub const DEFAULT_BLINK_SPEED_MS: u64 = 200;

/// Default length of one breathing pass, in milliseconds.
pub const DEFAULT_BREATH_SPEED_MS: u64 = 2000;

/// Default time each channel of a staggered sequence spends breathing.
pub const DEFAULT_STAGE_DURATION_MS: u64 = 2000;

/// Timing information returned by [`EffectEngine::service`](crate::EffectEngine::service).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceTiming<D> {
    /// At least one timer is pending. Service again after this delay.
    Delay(D),

    /// No timer is pending. Nothing to do until a new effect is started.
    Idle,
}

/// Errors returned when starting an effect.
///
/// Every error leaves the targeted channel switched off; none of them is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EffectError {
    /// Effect speed (period) was zero.
    InvalidSpeed,

    /// The channel does not exist in the engine.
    InvalidChannel(ChannelId),

    /// The timer queue is full.
    TimerCapacityExceeded,

    /// No free slot to track another breathing effect.
    EffectCapacityExceeded,

    /// `trigger_sequence` was called without a sequence plan.
    NoSequence,
}

impl core::fmt::Display for EffectError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EffectError::InvalidSpeed => {
                write!(f, "effect speed must be greater than zero")
            }
            EffectError::InvalidChannel(id) => {
                write!(f, "channel {} does not exist", id.0)
            }
            EffectError::TimerCapacityExceeded => {
                write!(f, "timer queue capacity exceeded")
            }
            EffectError::EffectCapacityExceeded => {
                write!(f, "breathing effect capacity exceeded")
            }
            EffectError::NoSequence => {
                write!(f, "no sequence plan configured")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EffectError {}
