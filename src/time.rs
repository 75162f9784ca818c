//! Time abstraction traits for platform-agnostic timing.

/// Trait for abstracting time sources.
pub trait TimeSource<I: TimeInstant> {
    /// Returns the current time instant.
    fn now(&self) -> I;
}

/// Trait abstraction for duration types.
///
/// The breathing engine ticks every 12.5 ms, so the timer queue keeps its
/// deadlines in microseconds. Duration types with sub-millisecond resolution
/// should override [`as_micros`](TimeDuration::as_micros) and
/// [`from_micros`](TimeDuration::from_micros); the defaults fall back to
/// millisecond resolution.
pub trait TimeDuration: Copy + PartialEq {
    /// Zero duration constant.
    const ZERO: Self;

    /// Converts duration to milliseconds.
    fn as_millis(&self) -> u64;

    /// Creates duration from milliseconds.
    fn from_millis(millis: u64) -> Self;

    /// Converts duration to microseconds.
    fn as_micros(&self) -> u64 {
        self.as_millis().saturating_mul(1000)
    }

    /// Creates duration from microseconds, rounding up to the next millisecond
    /// by default so a host sleeping for it never wakes before a deadline.
    fn from_micros(micros: u64) -> Self {
        Self::from_millis(micros.div_ceil(1000))
    }
}

/// Trait abstraction for instant types.
pub trait TimeInstant: Copy {
    /// Duration type for this instant.
    type Duration: TimeDuration;

    /// Calculates duration since an earlier instant.
    fn duration_since(&self, earlier: Self) -> Self::Duration;
}
