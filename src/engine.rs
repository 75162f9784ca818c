//! Effect engine with timer dispatch and channel ownership.
//!
//! Provides [`EffectEngine`], which owns a fixed set of [`PulseChannel`]s and
//! a [`TimerQueue`], runs blink and breathing effects on them, and fires the
//! staggered breathing sequence on demand. The host calls
//! [`service`](EffectEngine::service) from its main loop and sleeps for the
//! returned delay, the same way a sequencer is serviced.

use crate::blink::{BlinkRegistry, BlinkState};
use crate::breath::{BreathCycle, BreathEffect, CYCLE_LENGTH_US, CycleStatus};
use crate::channel::{ChannelId, PulseChannel};
use crate::sequence::{SEQUENCE_STAGES, SequencePlan};
use crate::time::{TimeDuration, TimeInstant, TimeSource};
use crate::timer::{TimerError, TimerHandle, TimerQueue};
use crate::types::{DEFAULT_BLINK_SPEED_MS, DEFAULT_BREATH_SPEED_MS, EffectError, ServiceTiming};

impl From<TimerError> for EffectError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::QueueFull => EffectError::TimerCapacityExceeded,
            TimerError::ZeroPeriod => EffectError::InvalidSpeed,
        }
    }
}

/// Work attached to a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    BreathTick(usize),
    BreathRestart(usize),
    BreathStop(usize),
    BlinkToggle(ChannelId),
    BlinkStop(ChannelId),
    SequenceStage {
        channel: ChannelId,
        how_long_us: u64,
        speed_us: u64,
    },
}

/// Runs blink and breathing effects on a set of channels.
///
/// All effects share one timer queue and are dispatched from
/// [`service`](Self::service), so no two callbacks ever run concurrently.
/// Writes to a channel from overlapping effects are last-write-wins.
///
/// # Type Parameters
/// * `'t` - Lifetime of the time source reference
/// * `I` - Time instant type
/// * `C` - Channel implementation type (same for all channels)
/// * `T` - Time source implementation type
/// * `CHANNELS` - Number of channels
/// * `TIMERS` - Maximum number of pending timers
/// * `BREATHS` - Maximum number of concurrent breathing effects
pub struct EffectEngine<
    't,
    I: TimeInstant,
    C: PulseChannel,
    T: TimeSource<I>,
    const CHANNELS: usize,
    const TIMERS: usize,
    const BREATHS: usize,
> {
    channels: [C; CHANNELS],
    time_source: &'t T,
    origin: I,
    timers: TimerQueue<Task, TIMERS>,
    breaths: [Option<BreathEffect>; BREATHS],
    blinks: BlinkRegistry<CHANNELS>,
    plan: Option<SequencePlan<I::Duration>>,
}

impl<'t, I, C, T, const CHANNELS: usize, const TIMERS: usize, const BREATHS: usize>
    EffectEngine<'t, I, C, T, CHANNELS, TIMERS, BREATHS>
where
    I: TimeInstant,
    C: PulseChannel,
    T: TimeSource<I>,
{
    /// Creates an idle engine and switches every channel off.
    ///
    /// Time is measured from this call.
    pub fn new(mut channels: [C; CHANNELS], time_source: &'t T) -> Self {
        for channel in channels.iter_mut() {
            channel.write_level(false);
        }

        Self {
            channels,
            time_source,
            origin: time_source.now(),
            timers: TimerQueue::new(),
            breaths: [None; BREATHS],
            blinks: BlinkRegistry::new(),
            plan: None,
        }
    }

    /// Creates an engine with a sequence plan for
    /// [`trigger_sequence`](Self::trigger_sequence).
    pub fn with_sequence(
        channels: [C; CHANNELS],
        time_source: &'t T,
        plan: SequencePlan<I::Duration>,
    ) -> Self {
        let mut engine = Self::new(channels, time_source);
        engine.plan = Some(plan);
        engine
    }

    /// Replaces the sequence plan. Sequences already in flight finish with
    /// the stages they were triggered with.
    pub fn set_sequence(&mut self, plan: SequencePlan<I::Duration>) {
        self.plan = Some(plan);
    }

    fn now_us(&self) -> u64 {
        self.time_source.now().duration_since(self.origin).as_micros()
    }

    fn check_channel(&self, id: ChannelId) -> Result<(), EffectError> {
        if id.0 < CHANNELS {
            Ok(())
        } else {
            Err(EffectError::InvalidChannel(id))
        }
    }

    /// Blinks `channel` at the default speed (200 ms) for `how_long`.
    pub fn blink(&mut self, channel: ChannelId, how_long: I::Duration) -> Result<(), EffectError> {
        self.blink_with_speed(channel, how_long, I::Duration::from_millis(DEFAULT_BLINK_SPEED_MS))
    }

    /// Toggles `channel` every `speed` for `how_long`, then switches it off.
    ///
    /// A blink already running on `channel` is cancelled first. The first
    /// toggle (to on) happens one `speed` after this call.
    ///
    /// # Errors
    /// * `InvalidChannel` - `channel` is out of range
    /// * `InvalidSpeed` - `speed` is zero
    /// * `TimerCapacityExceeded` - no room for the blink's timers
    pub fn blink_with_speed(
        &mut self,
        channel: ChannelId,
        how_long: I::Duration,
        speed: I::Duration,
    ) -> Result<(), EffectError> {
        self.check_channel(channel)?;

        if let Some(previous) = self.blinks.remove(channel) {
            self.timers.cancel(previous.toggle_timer);
            self.timers.cancel(previous.stop_timer);
        }

        let now = self.now_us();
        let speed_us = speed.as_micros();
        if speed_us == 0 {
            self.channels[channel.0].write_level(false);
            return Err(EffectError::InvalidSpeed);
        }

        let toggle_timer = match self
            .timers
            .schedule_periodic(now, speed_us, Task::BlinkToggle(channel))
        {
            Ok(handle) => handle,
            Err(err) => return Err(self.abort_effect(channel, err.into())),
        };

        let stop_timer = match self
            .timers
            .schedule_once(now, how_long.as_micros(), Task::BlinkStop(channel))
        {
            Ok(handle) => handle,
            Err(err) => {
                self.timers.cancel(toggle_timer);
                return Err(self.abort_effect(channel, err.into()));
            }
        };

        self.blinks
            .insert(channel, BlinkState::new(toggle_timer, stop_timer));

        #[cfg(feature = "defmt")]
        defmt::debug!("blink started on channel {}", channel.0);

        Ok(())
    }

    /// Stops the blink on `channel` and switches it off.
    ///
    /// Returns false if the channel was not blinking.
    pub fn cancel_blink(&mut self, channel: ChannelId) -> bool {
        match self.blinks.remove(channel) {
            Some(state) => {
                self.timers.cancel(state.toggle_timer);
                self.timers.cancel(state.stop_timer);
                self.channels[channel.0].write_level(false);
                true
            }
            None => false,
        }
    }

    /// Returns true if `channel` is blinking.
    pub fn is_blinking(&self, channel: ChannelId) -> bool {
        self.blinks.is_blinking(channel)
    }

    /// Breathes `channel` at the default speed (2000 ms per pass) for `how_long`.
    pub fn breathe(&mut self, channel: ChannelId, how_long: I::Duration) -> Result<(), EffectError> {
        self.breathe_with_speed(channel, how_long, I::Duration::from_millis(DEFAULT_BREATH_SPEED_MS))
    }

    /// Breathes `channel` with back-to-back passes of `speed` each, starting
    /// now, until `how_long` elapses; then switches it off, cutting the
    /// current pass short if needed.
    ///
    /// Breathing effects do not exclude each other: two effects on the same
    /// channel both write to it.
    ///
    /// # Errors
    /// * `InvalidChannel` - `channel` is out of range
    /// * `InvalidSpeed` - `speed` is zero
    /// * `EffectCapacityExceeded` - all breathing slots are busy
    /// * `TimerCapacityExceeded` - no room for the effect's timers
    pub fn breathe_with_speed(
        &mut self,
        channel: ChannelId,
        how_long: I::Duration,
        speed: I::Duration,
    ) -> Result<(), EffectError> {
        let now = self.now_us();
        self.start_breath(now, channel, how_long.as_micros(), speed.as_micros())
            .map(|_| ())
    }

    fn start_breath(
        &mut self,
        at_us: u64,
        channel: ChannelId,
        how_long_us: u64,
        speed_us: u64,
    ) -> Result<usize, EffectError> {
        self.check_channel(channel)?;

        let cycle = match BreathCycle::new(speed_us as f32 / 1000.0) {
            Ok(cycle) => cycle,
            Err(err) => return Err(self.abort_effect(channel, err)),
        };

        let Some(slot) = self.breaths.iter().position(Option::is_none) else {
            return Err(self.abort_effect(channel, EffectError::EffectCapacityExceeded));
        };

        // Stop first: at a shared deadline it wins over the restart and over
        // the final tick of the running pass.
        let stop_timer = match self
            .timers
            .schedule_once(at_us, how_long_us, Task::BreathStop(slot))
        {
            Ok(handle) => handle,
            Err(err) => return Err(self.abort_effect(channel, err.into())),
        };

        let restart_timer = match self
            .timers
            .schedule_periodic(at_us, speed_us, Task::BreathRestart(slot))
        {
            Ok(handle) => handle,
            Err(err) => {
                self.timers.cancel(stop_timer);
                return Err(self.abort_effect(channel, err.into()));
            }
        };

        let cycle_timer = match self
            .timers
            .schedule_periodic(at_us, CYCLE_LENGTH_US, Task::BreathTick(slot))
        {
            Ok(handle) => handle,
            Err(err) => {
                self.timers.cancel(stop_timer);
                self.timers.cancel(restart_timer);
                return Err(self.abort_effect(channel, err.into()));
            }
        };

        self.breaths[slot] = Some(BreathEffect {
            channel,
            cycle,
            cycle_timer: Some(cycle_timer),
            restart_timer,
            stop_timer,
        });

        #[cfg(feature = "defmt")]
        defmt::debug!("breathing started on channel {} (slot {})", channel.0, slot);

        Ok(slot)
    }

    /// Ends every breathing effect on `channel` and switches it off.
    ///
    /// Returns the number of effects stopped.
    pub fn stop_breathing(&mut self, channel: ChannelId) -> usize {
        let mut stopped = 0;

        for slot in 0..BREATHS {
            if self.breaths[slot].is_some_and(|effect| effect.channel == channel) {
                self.end_breath(slot);
                stopped += 1;
            }
        }

        stopped
    }

    /// Returns the number of breathing effects running on `channel`.
    pub fn active_breaths(&self, channel: ChannelId) -> usize {
        self.breaths
            .iter()
            .flatten()
            .filter(|effect| effect.channel == channel)
            .count()
    }

    /// Switches the plan's channels off and starts the staggered sequence.
    ///
    /// Call once at startup and again on every button press. A trigger while
    /// a previous sequence is still running overlaps with it. Later stages
    /// keep the plan they were triggered with.
    ///
    /// A trigger either starts every stage or none: on failure the stages
    /// already started are stopped and the plan's channels are left off.
    ///
    /// # Errors
    /// * `NoSequence` - no plan configured
    /// * any error from starting the first stage or scheduling later ones
    pub fn trigger_sequence(&mut self) -> Result<(), EffectError> {
        let plan = self.plan.ok_or(EffectError::NoSequence)?;

        for channel in plan.channels() {
            self.check_channel(channel)?;
            self.channels[channel.0].write_level(false);
        }

        let now = self.now_us();
        let mut started: [Option<usize>; SEQUENCE_STAGES] = [None; SEQUENCE_STAGES];
        let mut scheduled: [Option<TimerHandle>; SEQUENCE_STAGES] = [None; SEQUENCE_STAGES];

        for (index, stage) in plan.stages().iter().enumerate() {
            let delay_us = stage.delay.as_micros();
            let how_long_us = stage.how_long.as_micros();
            let speed_us = stage.speed.as_micros();

            let result = if delay_us == 0 {
                match self.start_breath(now, stage.channel, how_long_us, speed_us) {
                    Ok(slot) => {
                        started[index] = Some(slot);
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            } else {
                let task = Task::SequenceStage {
                    channel: stage.channel,
                    how_long_us,
                    speed_us,
                };
                match self.timers.schedule_once(now, delay_us, task) {
                    Ok(handle) => {
                        scheduled[index] = Some(handle);
                        Ok(())
                    }
                    Err(err) => Err(err.into()),
                }
            };

            if let Err(err) = result {
                for slot in started.iter().flatten() {
                    self.end_breath(*slot);
                }
                for handle in scheduled.iter().flatten() {
                    self.timers.cancel(*handle);
                }
                for channel in plan.channels() {
                    self.channels[channel.0].write_level(false);
                }

                #[cfg(feature = "defmt")]
                defmt::warn!("sequence trigger failed: {}", err);

                return Err(err);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("sequence triggered");

        Ok(())
    }

    /// Fires every timer that is due and reports when to service again.
    pub fn service(&mut self) -> ServiceTiming<I::Duration> {
        let now = self.now_us();

        while let Some(expired) = self.timers.pop_due(now) {
            self.dispatch(expired.task, expired.deadline_us);
        }

        match self.timers.next_deadline() {
            Some(deadline) => ServiceTiming::Delay(I::Duration::from_micros(
                deadline.saturating_sub(now),
            )),
            None => ServiceTiming::Idle,
        }
    }

    fn dispatch(&mut self, task: Task, at_us: u64) {
        match task {
            Task::BreathTick(slot) => self.on_breath_tick(slot),
            Task::BreathRestart(slot) => self.on_breath_restart(slot, at_us),
            Task::BreathStop(slot) => self.end_breath(slot),
            Task::BlinkToggle(channel) => {
                if let Some(on) = self.blinks.toggle(channel) {
                    self.channels[channel.0].write_level(on);
                }
            }
            Task::BlinkStop(channel) => {
                self.cancel_blink(channel);
            }
            Task::SequenceStage {
                channel,
                how_long_us,
                speed_us,
            } => self.on_sequence_stage(channel, how_long_us, speed_us, at_us),
        }
    }

    fn on_breath_tick(&mut self, slot: usize) {
        let Some(effect) = self.breaths[slot].as_mut() else {
            return;
        };

        let channel = &mut self.channels[effect.channel.0];
        if effect.cycle.tick(channel) == CycleStatus::Complete {
            if let Some(handle) = effect.cycle_timer.take() {
                self.timers.cancel(handle);
            }
        }
    }

    fn on_breath_restart(&mut self, slot: usize, at_us: u64) {
        // The finishing pass's last sample may share this deadline
        let last_tick_due = self.breaths[slot]
            .and_then(|effect| effect.cycle_timer)
            .and_then(|handle| self.timers.deadline(handle))
            .is_some_and(|deadline| deadline <= at_us);
        if last_tick_due {
            self.on_breath_tick(slot);
        }

        let Some(effect) = self.breaths[slot].as_mut() else {
            return;
        };

        // Passes never overlap: whatever is left of the previous one is dropped
        if let Some(handle) = effect.cycle_timer.take() {
            self.timers.cancel(handle);
        }

        effect.cycle.reset();
        match self
            .timers
            .schedule_periodic(at_us, CYCLE_LENGTH_US, Task::BreathTick(slot))
        {
            Ok(handle) => effect.cycle_timer = Some(handle),
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("no timer for breathing pass on slot {}", slot);
                self.end_breath(slot);
            }
        }
    }

    fn end_breath(&mut self, slot: usize) {
        let Some(effect) = self.breaths[slot].take() else {
            return;
        };

        self.timers.cancel(effect.stop_timer);
        self.timers.cancel(effect.restart_timer);
        if let Some(handle) = effect.cycle_timer {
            self.timers.cancel(handle);
        }

        self.channels[effect.channel.0].write_level(false);

        #[cfg(feature = "defmt")]
        defmt::debug!("breathing stopped on channel {}", effect.channel.0);
    }

    fn on_sequence_stage(
        &mut self,
        channel: ChannelId,
        how_long_us: u64,
        speed_us: u64,
        at_us: u64,
    ) {
        if let Err(_err) = self.start_breath(at_us, channel, how_long_us, speed_us) {
            #[cfg(feature = "defmt")]
            defmt::warn!("sequence stage on channel {} failed: {}", channel.0, _err);
        }
    }

    /// Switches `channel` off after a failed start and passes `err` through.
    fn abort_effect(&mut self, channel: ChannelId, err: EffectError) -> EffectError {
        #[cfg(feature = "defmt")]
        defmt::warn!("effect on channel {} aborted: {}", channel.0, err);

        self.channels[channel.0].write_level(false);
        err
    }

    /// Cancels every effect and pending stage and switches all channels off.
    pub fn clear(&mut self) {
        self.timers.clear();
        self.breaths = [None; BREATHS];
        self.blinks = BlinkRegistry::new();

        for channel in self.channels.iter_mut() {
            channel.write_level(false);
        }
    }

    /// Returns the number of pending timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Returns the channel with the given ID.
    pub fn channel(&self, id: ChannelId) -> Option<&C> {
        self.channels.get(id.0)
    }

    /// Returns the channel with the given ID mutably.
    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut C> {
        self.channels.get_mut(id.0)
    }

    /// Consumes the engine and returns its channels.
    pub fn into_channels(self) -> [C; CHANNELS] {
        self.channels
    }
}
