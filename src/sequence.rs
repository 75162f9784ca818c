//! Staggered three-channel breathing sequence.
//!
//! A [`SequencePlan`] is an ordered list of stages, each breathing one channel
//! for a fixed time after a delay from the trigger. The engine runs stages with
//! zero delay immediately and schedules the rest as one-shot timers.

use crate::channel::ChannelId;
use crate::time::TimeDuration;
use crate::types::{DEFAULT_BREATH_SPEED_MS, DEFAULT_STAGE_DURATION_MS};

/// Number of stages in a sequence.
pub const SEQUENCE_STAGES: usize = 3;

/// One stage of a sequence: breathe `channel` for `how_long` once `delay`
/// has elapsed since the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceStage<D: TimeDuration> {
    /// Delay from the trigger.
    pub delay: D,
    /// Channel to breathe.
    pub channel: ChannelId,
    /// How long the channel breathes.
    pub how_long: D,
    /// Length of one breathing pass.
    pub speed: D,
}

/// Ordered stages of a staggered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequencePlan<D: TimeDuration> {
    stages: [SequenceStage<D>; SEQUENCE_STAGES],
}

impl<D: TimeDuration> SequencePlan<D> {
    /// Builds a stagger over `channels`: the first breathes at once, each
    /// following one starts `stage_duration` after the previous, and every
    /// channel breathes for `stage_duration` at the default breathing speed.
    pub fn new(channels: [ChannelId; SEQUENCE_STAGES], stage_duration: D) -> Self {
        let step = stage_duration.as_micros();
        let speed = D::from_millis(DEFAULT_BREATH_SPEED_MS);

        let stages = core::array::from_fn(|idx| SequenceStage {
            delay: D::from_micros(step * idx as u64),
            channel: channels[idx],
            how_long: stage_duration,
            speed,
        });

        Self { stages }
    }

    /// Stagger over channels 0, 1 and 2 with the default stage duration.
    pub fn default_stagger() -> Self {
        Self::new(
            [ChannelId(0), ChannelId(1), ChannelId(2)],
            D::from_millis(DEFAULT_STAGE_DURATION_MS),
        )
    }

    /// Returns the stages in trigger order.
    pub fn stages(&self) -> &[SequenceStage<D>] {
        &self.stages
    }

    /// Returns the stage at `index`.
    pub fn stage(&self, index: usize) -> Option<&SequenceStage<D>> {
        self.stages.get(index)
    }

    /// Returns the channels touched by this plan.
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.stages.iter().map(|s| s.channel)
    }
}
