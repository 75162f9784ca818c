//! Fixed-capacity logical timer queue.
//!
//! Provides [`TimerQueue`], the single cooperative timer facility every effect
//! is scheduled on. The queue never reads a clock itself: callers pass the
//! current logical time in microseconds, which keeps it deterministic under
//! test and independent of the host timer hardware.

use heapless::Vec;

/// Handle to a scheduled timer.
///
/// Handles are never reused, so cancelling a stale handle can not hit a newer
/// timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerHandle(u64);

/// Whether a timer fires once or repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerKind {
    /// Fires once, then is removed.
    Once,
    /// Fires every `period_us` until cancelled.
    Periodic { period_us: u64 },
}

/// Errors returned when scheduling a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerError {
    /// The queue is full.
    QueueFull,
    /// A periodic timer was requested with a zero period.
    ZeroPeriod,
}

impl core::fmt::Display for TimerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TimerError::QueueFull => write!(f, "timer queue is full"),
            TimerError::ZeroPeriod => write!(f, "periodic timer period must be non-zero"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TimerError {}

/// A timer that came due, returned by [`TimerQueue::pop_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired<T> {
    /// Handle of the timer that fired.
    pub handle: TimerHandle,
    /// The deadline it fired for, which may be earlier than the current time
    /// when the queue is serviced late.
    pub deadline_us: u64,
    /// Task registered with the timer.
    pub task: T,
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry<T> {
    handle: TimerHandle,
    deadline_us: u64,
    kind: TimerKind,
    task: T,
}

/// Timer queue holding at most `N` live timers.
///
/// Timers are delivered strictly by deadline. Timers sharing a deadline fire
/// in the order they were first scheduled.
#[derive(Debug)]
pub struct TimerQueue<T: Copy, const N: usize> {
    entries: Vec<TimerEntry<T>, N>,
    next_id: u64,
}

impl<T: Copy, const N: usize> TimerQueue<T, N> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Schedules `task` to fire once, `delay_us` after `now_us`.
    pub fn schedule_once(
        &mut self,
        now_us: u64,
        delay_us: u64,
        task: T,
    ) -> Result<TimerHandle, TimerError> {
        self.insert(now_us.saturating_add(delay_us), TimerKind::Once, task)
    }

    /// Schedules `task` to fire every `period_us`, first at `now_us + period_us`.
    pub fn schedule_periodic(
        &mut self,
        now_us: u64,
        period_us: u64,
        task: T,
    ) -> Result<TimerHandle, TimerError> {
        if period_us == 0 {
            return Err(TimerError::ZeroPeriod);
        }

        self.insert(
            now_us.saturating_add(period_us),
            TimerKind::Periodic { period_us },
            task,
        )
    }

    fn insert(
        &mut self,
        deadline_us: u64,
        kind: TimerKind,
        task: T,
    ) -> Result<TimerHandle, TimerError> {
        let handle = TimerHandle(self.next_id);

        self.entries
            .push(TimerEntry {
                handle,
                deadline_us,
                kind,
                task,
            })
            .map_err(|_| TimerError::QueueFull)?;

        self.next_id += 1;
        Ok(handle)
    }

    /// Cancels a timer.
    ///
    /// Returns `false` when the timer already fired (one-shot) or was already
    /// cancelled; that case is a no-op.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.entries.iter().position(|e| e.handle == handle) {
            Some(idx) => {
                self.entries.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns true if the timer is still scheduled.
    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    /// Returns the next deadline of a scheduled timer.
    pub fn deadline(&self, handle: TimerHandle) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.handle == handle)
            .map(|e| e.deadline_us)
    }

    /// Removes and returns the earliest timer due at `now_us`.
    ///
    /// Periodic timers are re-armed one period after the deadline they fired
    /// for, so a late caller catches up tick by tick instead of drifting.
    pub fn pop_due(&mut self, now_us: u64) -> Option<Expired<T>> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline_us <= now_us)
            .min_by_key(|(_, e)| (e.deadline_us, e.handle.0))
            .map(|(idx, _)| idx)?;

        let entry = self.entries[idx];
        match entry.kind {
            TimerKind::Once => {
                self.entries.swap_remove(idx);
            }
            TimerKind::Periodic { period_us } => {
                self.entries[idx].deadline_us = entry.deadline_us.saturating_add(period_us);
            }
        }

        Some(Expired {
            handle: entry.handle,
            deadline_us: entry.deadline_us,
            task: entry.task,
        })
    }

    /// Returns the earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.deadline_us).min()
    }

    /// Drops every pending timer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of pending timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no timer is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Copy, const N: usize> Default for TimerQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Task {
        A,
        B,
        C,
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut queue = TimerQueue::<Task, 4>::new();
        queue.schedule_once(0, 300, Task::A).unwrap();
        queue.schedule_once(0, 100, Task::B).unwrap();
        queue.schedule_once(0, 200, Task::C).unwrap();

        assert_eq!(queue.pop_due(1000).map(|e| e.task), Some(Task::B));
        assert_eq!(queue.pop_due(1000).map(|e| e.task), Some(Task::C));
        assert_eq!(queue.pop_due(1000).map(|e| e.task), Some(Task::A));
        assert!(queue.pop_due(1000).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_deadlines_fire_in_scheduling_order() {
        let mut queue = TimerQueue::<Task, 4>::new();
        queue.schedule_periodic(0, 200, Task::A).unwrap();
        queue.schedule_once(0, 1000, Task::B).unwrap();

        // Periodic timer re-armed four times still precedes the one-shot at 1000
        let mut fired = 0;
        while let Some(expired) = queue.pop_due(999) {
            assert_eq!(expired.task, Task::A);
            fired += 1;
        }
        assert_eq!(fired, 4);

        assert_eq!(queue.pop_due(1000).map(|e| e.task), Some(Task::A));
        assert_eq!(queue.pop_due(1000).map(|e| e.task), Some(Task::B));
    }

    #[test]
    fn nothing_fires_before_deadline() {
        let mut queue = TimerQueue::<Task, 4>::new();
        queue.schedule_once(0, 500, Task::A).unwrap();

        assert!(queue.pop_due(499).is_none());
        assert_eq!(queue.next_deadline(), Some(500));

        let expired = queue.pop_due(500).unwrap();
        assert_eq!(expired.deadline_us, 500);
    }

    #[test]
    fn periodic_timer_rearms_from_deadline() {
        let mut queue = TimerQueue::<Task, 4>::new();
        queue.schedule_periodic(0, 12_500, Task::A).unwrap();

        // Serviced late: still reports the scheduled deadlines
        let first = queue.pop_due(30_000).unwrap();
        let second = queue.pop_due(30_000).unwrap();
        assert_eq!(first.deadline_us, 12_500);
        assert_eq!(second.deadline_us, 25_000);
        assert!(queue.pop_due(30_000).is_none());
        assert_eq!(queue.next_deadline(), Some(37_500));
    }

    #[test]
    fn deadline_tracks_rearmed_timer() {
        let mut queue = TimerQueue::<Task, 4>::new();
        let a = queue.schedule_periodic(0, 100, Task::A).unwrap();

        assert_eq!(queue.deadline(a), Some(100));
        queue.pop_due(100).unwrap();
        assert_eq!(queue.deadline(a), Some(200));

        queue.cancel(a);
        assert_eq!(queue.deadline(a), None);
    }

    #[test]
    fn cancel_twice_is_a_noop() {
        let mut queue = TimerQueue::<Task, 4>::new();
        let a = queue.schedule_periodic(0, 100, Task::A).unwrap();
        let b = queue.schedule_periodic(0, 100, Task::B).unwrap();

        assert!(queue.cancel(a));
        assert!(!queue.cancel(a));

        assert!(!queue.is_scheduled(a));
        assert!(queue.is_scheduled(b));
        assert_eq!(queue.pop_due(100).map(|e| e.task), Some(Task::B));
    }

    #[test]
    fn fired_one_shot_cannot_be_cancelled() {
        let mut queue = TimerQueue::<Task, 4>::new();
        let a = queue.schedule_once(0, 10, Task::A).unwrap();
        queue.pop_due(10).unwrap();

        assert!(!queue.cancel(a));
    }

    #[test]
    fn stale_handle_does_not_cancel_new_timer() {
        let mut queue = TimerQueue::<Task, 1>::new();
        let old = queue.schedule_once(0, 10, Task::A).unwrap();
        queue.cancel(old);

        let new = queue.schedule_once(0, 10, Task::B).unwrap();
        assert_ne!(old, new);
        assert!(!queue.cancel(old));
        assert!(queue.is_scheduled(new));
    }

    #[test]
    fn rejects_when_full() {
        let mut queue = TimerQueue::<Task, 2>::new();
        queue.schedule_once(0, 10, Task::A).unwrap();
        queue.schedule_once(0, 10, Task::B).unwrap();

        assert_eq!(
            queue.schedule_once(0, 10, Task::C),
            Err(TimerError::QueueFull)
        );
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn rejects_zero_period() {
        let mut queue = TimerQueue::<Task, 2>::new();

        assert_eq!(
            queue.schedule_periodic(0, 0, Task::A),
            Err(TimerError::ZeroPeriod)
        );
        assert!(queue.is_empty());
    }
}
