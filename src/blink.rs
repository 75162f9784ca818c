//! Per-channel blink bookkeeping.

use crate::channel::ChannelId;
use crate::timer::TimerHandle;

/// State of one running blink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlinkState {
    /// Level written on the last toggle. Starts off.
    pub is_on: bool,
    /// Periodic timer toggling the channel.
    pub toggle_timer: TimerHandle,
    /// One-shot timer ending the blink.
    pub stop_timer: TimerHandle,
}

impl BlinkState {
    /// Creates a blink state that has not toggled yet.
    pub fn new(toggle_timer: TimerHandle, stop_timer: TimerHandle) -> Self {
        Self {
            is_on: false,
            toggle_timer,
            stop_timer,
        }
    }
}

/// Table of running blinks, at most one per channel.
///
/// # Type Parameters
/// * `N` - Number of channels addressable by this registry
#[derive(Debug)]
pub struct BlinkRegistry<const N: usize> {
    states: [Option<BlinkState>; N],
}

impl<const N: usize> BlinkRegistry<N> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { states: [None; N] }
    }

    /// Registers a blink, returning the one it replaces.
    ///
    /// The caller must cancel the returned state's timers. Out-of-range
    /// channels are ignored and hand `state` straight back.
    pub fn insert(&mut self, id: ChannelId, state: BlinkState) -> Option<BlinkState> {
        match self.states.get_mut(id.0) {
            Some(slot) => slot.replace(state),
            None => Some(state),
        }
    }

    /// Unregisters and returns the blink on `id`.
    pub fn remove(&mut self, id: ChannelId) -> Option<BlinkState> {
        self.states.get_mut(id.0).and_then(Option::take)
    }

    /// Flips the level of the blink on `id` and returns the new level.
    pub fn toggle(&mut self, id: ChannelId) -> Option<bool> {
        let state = self.states.get_mut(id.0)?.as_mut()?;
        state.is_on = !state.is_on;
        Some(state.is_on)
    }

    /// Returns the blink on `id`, if any.
    pub fn get(&self, id: ChannelId) -> Option<&BlinkState> {
        self.states.get(id.0)?.as_ref()
    }

    /// Returns true if `id` is blinking.
    pub fn is_blinking(&self, id: ChannelId) -> bool {
        self.get(id).is_some()
    }
}

impl<const N: usize> Default for BlinkRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}
