//! Timing primitives shared by the detector, the keypad and every driver.
//!
//! Nothing in here reads a clock. Callers pass timestamps in, which keeps the
//! state machines deterministic under test and lets the firmware and the
//! emulator supply their own monotonic sources.

use core::time::Duration;

/// Monotonic timestamp supplied by a driver clock.
pub trait Timestamp: Copy + Ord {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;

    /// Returns `self + duration`, or `None` when the clock representation overflows.
    fn checked_add(&self, duration: Duration) -> Option<Self>;
}

/// Tracks the start of a condition that must hold for a minimum window.
///
/// The start time is captured once per episode: repeated calls to
/// [`DebounceTimer::start`] while running keep the original timestamp.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebounceTimer<I> {
    started_at: Option<I>,
}

impl<I> DebounceTimer<I>
where
    I: Timestamp,
{
    /// Creates an idle timer.
    #[must_use]
    pub const fn new() -> Self {
        Self { started_at: None }
    }

    /// Starts the timer at `now` unless it is already running.
    ///
    /// Returns `true` when this call began a new episode.
    pub fn start(&mut self, now: I) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(now);
        true
    }

    /// Stops the timer and forgets the episode start.
    ///
    /// Returns `true` when the timer was running.
    pub fn clear(&mut self) -> bool {
        self.started_at.take().is_some()
    }

    /// Returns `true` while an episode is in progress.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Timestamp captured when the current episode began.
    #[must_use]
    pub const fn started_at(&self) -> Option<I> {
        self.started_at
    }

    /// Time elapsed since the episode began, if running.
    #[must_use]
    pub fn elapsed(&self, now: I) -> Option<Duration> {
        self.started_at.map(|start| now.saturating_duration_since(start))
    }

    /// Returns `true` when running and strictly more than `window` has elapsed.
    #[must_use]
    pub fn elapsed_exceeds(&self, now: I, window: Duration) -> bool {
        self.elapsed(now).is_some_and(|elapsed| elapsed > window)
    }
}

impl<I> Default for DebounceTimer<I>
where
    I: Timestamp,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Output value paired with the time it must be held before the next read.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HoldAction<T> {
    pub value: T,
    pub hold: Duration,
}

impl<T> HoldAction<T> {
    #[must_use]
    pub const fn new(value: T, hold: Duration) -> Self {
        Self { value, hold }
    }

    /// Returns the hold duration.
    #[must_use]
    pub const fn hold_duration(&self) -> Duration {
        self.hold
    }

    /// Returns the deadline at which the hold ends, starting from `now`.
    pub fn deadline<I>(&self, now: I) -> Option<I>
    where
        I: Timestamp,
    {
        now.checked_add(self.hold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    struct MockInstant(u64);

    impl Timestamp for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }

        fn checked_add(&self, duration: Duration) -> Option<Self> {
            let millis = u64::try_from(duration.as_millis()).ok()?;
            self.0.checked_add(millis).map(Self)
        }
    }

    #[test]
    fn debounce_keeps_first_start() {
        let mut timer = DebounceTimer::new();
        assert!(timer.start(MockInstant(10)));
        assert!(!timer.start(MockInstant(50)));
        assert_eq!(timer.started_at(), Some(MockInstant(10)));
    }

    #[test]
    fn debounce_window_is_exclusive() {
        let mut timer = DebounceTimer::new();
        timer.start(MockInstant(1_000));
        let window = Duration::from_millis(100);

        assert!(!timer.elapsed_exceeds(MockInstant(1_099), window));
        assert!(!timer.elapsed_exceeds(MockInstant(1_100), window));
        assert!(timer.elapsed_exceeds(MockInstant(1_101), window));
    }

    #[test]
    fn cleared_timer_never_exceeds() {
        let mut timer = DebounceTimer::new();
        timer.start(MockInstant(0));
        assert!(timer.clear());
        assert!(!timer.clear());
        assert!(!timer.elapsed_exceeds(MockInstant(60_000), Duration::ZERO));
        assert_eq!(timer.elapsed(MockInstant(5)), None);
    }

    #[test]
    fn hold_action_reports_deadline() {
        let action = HoldAction::new(true, Duration::from_millis(500));
        assert_eq!(action.deadline(MockInstant(250)), Some(MockInstant(750)));
        assert_eq!(action.deadline(MockInstant(u64::MAX)), None);
    }
}
