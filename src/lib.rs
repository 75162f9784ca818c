#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`PulseChannel`**: Trait to implement for one LED output line (level + timed pulse)
//! - **`BreathCycle`**: One sine breathing pass sampled at 80 Hz, with the saturation snap
//! - **`EffectEngine`**: Owns the channels and a timer queue; runs blink, breathe and the staggered sequence
//! - **`SequencePlan`**: The three-stage breathing stagger fired by `trigger_sequence`
//! - **`TimerQueue`**: Cooperative periodic/one-shot timers with cancellation by handle
//! - **`TimeSource`**: Trait to implement for your timing system
//!
//! Nothing here blocks: every effect is a set of timers, and the host drives
//! them by calling `EffectEngine::service` and sleeping for the delay it returns.

pub mod time;
pub mod types;
pub mod channel;
pub mod timer;
pub mod breath;
pub mod blink;
pub mod sequence;
pub mod engine;

pub use breath::{BreathCycle, CYCLE_LENGTH_MS, CycleStatus, HZ, PulseOutput, pulse_duration, pulse_output};
pub use blink::{BlinkRegistry, BlinkState};
pub use channel::{ChannelId, PulseChannel, PwmPulseChannel};
pub use engine::EffectEngine;
pub use sequence::{SequencePlan, SequenceStage};
pub use time::{TimeDuration, TimeInstant, TimeSource};
pub use timer::{TimerError, TimerHandle, TimerQueue};
pub use types::{
    DEFAULT_BLINK_SPEED_MS, DEFAULT_BREATH_SPEED_MS, DEFAULT_STAGE_DURATION_MS, EffectError,
    ServiceTiming,
};

/// Engine for three channels with room for 32 timers and 8 concurrent breathing effects.
pub type EffectEngine3<'t, I, C, T> = EffectEngine<'t, I, C, T, 3, 32, 8>;
