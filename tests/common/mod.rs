//! Shared test infrastructure for led-breath integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use led_breath::{ChannelId, EffectEngine, PulseChannel, ServiceTiming, TimeDuration, TimeInstant, TimeSource};

// ============================================================================
// Mock Time Types
// ============================================================================

/// Mock duration type for testing (wraps microseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestDuration(pub u64);

impl TestDuration {
    pub fn ms(millis: u64) -> Self {
        TestDuration(millis * 1000)
    }
}

impl TimeDuration for TestDuration {
    const ZERO: Self = TestDuration(0);

    fn as_millis(&self) -> u64 {
        self.0 / 1000
    }

    fn from_millis(millis: u64) -> Self {
        TestDuration(millis * 1000)
    }

    fn as_micros(&self) -> u64 {
        self.0
    }

    fn from_micros(micros: u64) -> Self {
        TestDuration(micros)
    }
}

/// Mock instant type for testing (microseconds since start)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestInstant(pub u64);

impl TimeInstant for TestInstant {
    type Duration = TestDuration;

    fn duration_since(&self, earlier: Self) -> Self::Duration {
        TestDuration(self.0 - earlier.0)
    }
}

// ============================================================================
// Mock Time Source
// ============================================================================

/// Mock time source with controllable time advancement
pub struct MockTimeSource {
    current_time: core::cell::Cell<TestInstant>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self {
            current_time: core::cell::Cell::new(TestInstant(0)),
        }
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: TestDuration) {
        let current = self.current_time.get();
        self.current_time.set(TestInstant(current.0 + duration.0));
    }

    pub fn set_time(&self, time: TestInstant) {
        self.current_time.set(time);
    }
}

impl TimeSource<TestInstant> for MockTimeSource {
    fn now(&self) -> TestInstant {
        self.current_time.get()
    }
}

// ============================================================================
// Mock Channel
// ============================================================================

/// What a channel was asked to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelEvent {
    Level(bool),
    Pulse(f32),
}

/// Mock channel that records every write with its timestamp (microseconds)
pub struct MockChannel<'t> {
    clock: &'t MockTimeSource,
    events: Vec<(u64, ChannelEvent)>,
}

impl<'t> MockChannel<'t> {
    pub fn new(clock: &'t MockTimeSource) -> Self {
        Self {
            clock,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[(u64, ChannelEvent)] {
        &self.events
    }

    /// Events recorded at or after `from_us`
    pub fn events_since(&self, from_us: u64) -> impl Iterator<Item = &(u64, ChannelEvent)> {
        self.events.iter().filter(move |(t, _)| *t >= from_us)
    }

    pub fn last_event(&self) -> Option<(u64, ChannelEvent)> {
        self.events.last().copied()
    }

    /// Number of breathing ticks (pulses plus saturated full-on writes)
    pub fn breath_ticks(&self) -> usize {
        self.events
            .iter()
            .filter(|(_, e)| !matches!(e, ChannelEvent::Level(false)))
            .count()
    }

    pub fn level_writes(&self, on: bool) -> Vec<u64> {
        self.events
            .iter()
            .filter(|(_, e)| *e == ChannelEvent::Level(on))
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl PulseChannel for MockChannel<'_> {
    fn write_level(&mut self, on: bool) {
        self.events.push((self.clock.now().0, ChannelEvent::Level(on)));
    }

    fn emit_pulse(&mut self, duration_ms: f32) {
        self.events
            .push((self.clock.now().0, ChannelEvent::Pulse(duration_ms)));
    }
}

// ============================================================================
// Engine Helpers
// ============================================================================

pub type TestEngine<'t> = EffectEngine<'t, TestInstant, MockChannel<'t>, MockTimeSource, 3, 32, 8>;

/// Creates a three-channel engine and drops the power-on writes
pub fn new_engine(clock: &MockTimeSource) -> TestEngine<'_> {
    let channels = [
        MockChannel::new(clock),
        MockChannel::new(clock),
        MockChannel::new(clock),
    ];
    let mut engine = TestEngine::new(channels, clock);
    for id in 0..3 {
        engine.channel_mut(ChannelId(id)).unwrap().clear_events();
    }
    engine
}

/// Services the engine at every deadline up to and including `end`
pub fn run_until<const C: usize, const T: usize, const B: usize>(
    engine: &mut EffectEngine<'_, TestInstant, MockChannel<'_>, MockTimeSource, C, T, B>,
    clock: &MockTimeSource,
    end: TestDuration,
) {
    loop {
        let timing = engine.service();
        let now = clock.now().0;

        match timing {
            ServiceTiming::Delay(delay) if now + delay.0 <= end.0 => clock.advance(delay),
            _ => {
                if now < end.0 {
                    clock.set_time(TestInstant(end.0));
                    engine.service();
                }
                return;
            }
        }
    }
}

/// Microseconds for a whole number of milliseconds
pub const fn us(millis: u64) -> u64 {
    millis * 1000
}
