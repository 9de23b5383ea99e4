//! Metal detector frequency monitor shared by firmware and host targets.
//!
//! The oscillator in front of the search coil runs near 9.2 kHz with nothing
//! nearby and drops as metal approaches. Raw readings are noisy, so the
//! monitor discards readings outside an acceptance band, averages a fixed
//! number of accepted readings, and classifies the average against two
//! thresholds with a dead band between them. Arming is debounced in time;
//! disarming clears the output immediately.

use core::time::Duration;

use crate::config::ConfigError;
use crate::timing::{DebounceTimer, Timestamp};

pub mod window;

pub use window::AveragingWindow;

/// Lowest accepted raw frequency (exclusive).
pub const ACCEPT_MIN_HZ: u32 = 8_000;
/// Highest accepted raw frequency (exclusive).
pub const ACCEPT_MAX_HZ: u32 = 9_500;
/// Accepted samples per averaging window.
pub const WINDOW_SIZE: u8 = 20;
/// Averages strictly below this value arm the trigger.
pub const ARM_BELOW_HZ: u32 = 8_900;
/// Averages strictly above this value disarm the trigger.
pub const DISARM_ABOVE_HZ: u32 = 9_000;
/// Minimum armed time before the trigger output asserts (exclusive).
pub const TRIGGER_DEBOUNCE: Duration = Duration::from_millis(100);

/// One raw frequency reading, in hertz.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct FrequencySample(u32);

impl FrequencySample {
    #[must_use]
    pub const fn from_hz(hz: u32) -> Self {
        Self(hz)
    }

    #[must_use]
    pub const fn hz(self) -> u32 {
        self.0
    }

    /// Converts a measured high/low pulse pair (microseconds) into a frequency.
    ///
    /// Returns `None` when both halves timed out and the period is zero.
    #[must_use]
    pub const fn from_pulse_widths(high_us: u32, low_us: u32) -> Option<Self> {
        let period_us = high_us.saturating_add(low_us);
        if period_us == 0 {
            None
        } else {
            Some(Self(1_000_000 / period_us))
        }
    }
}

/// Thresholds and timing for the frequency monitor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DetectorConfig {
    pub accept_min_hz: u32,
    pub accept_max_hz: u32,
    pub window_size: u8,
    pub arm_below_hz: u32,
    pub disarm_above_hz: u32,
    pub debounce: Duration,
}

impl DetectorConfig {
    pub const fn new(
        accept_min_hz: u32,
        accept_max_hz: u32,
        window_size: u8,
        arm_below_hz: u32,
        disarm_above_hz: u32,
        debounce: Duration,
    ) -> Self {
        Self {
            accept_min_hz,
            accept_max_hz,
            window_size,
            arm_below_hz,
            disarm_above_hz,
            debounce,
        }
    }

    /// Returns `true` when `sample` lies strictly inside the acceptance band.
    #[must_use]
    pub const fn accepts(&self, sample: FrequencySample) -> bool {
        sample.hz() > self.accept_min_hz && sample.hz() < self.accept_max_hz
    }

    /// Checks the table for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accept_min_hz >= self.accept_max_hz {
            return Err(ConfigError::EmptyAcceptanceBand {
                min_hz: self.accept_min_hz,
                max_hz: self.accept_max_hz,
            });
        }
        if self.arm_below_hz > self.disarm_above_hz {
            return Err(ConfigError::InvertedHysteresis {
                arm_below_hz: self.arm_below_hz,
                disarm_above_hz: self.disarm_above_hz,
            });
        }
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self
            .accept_max_hz
            .checked_mul(u32::from(self.window_size))
            .is_none()
        {
            return Err(ConfigError::WindowOverflow {
                window_size: self.window_size,
            });
        }
        Ok(())
    }
}

/// Detector configuration used by the device.
pub const DEFAULT_DETECTOR_CONFIG: DetectorConfig = DetectorConfig::new(
    ACCEPT_MIN_HZ,
    ACCEPT_MAX_HZ,
    WINDOW_SIZE,
    ARM_BELOW_HZ,
    DISARM_ABOVE_HZ,
    TRIGGER_DEBOUNCE,
);

/// Trigger state change produced by resolving a window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TriggerTransition {
    /// Low average while idle; the debounce window starts now.
    Armed,
    /// Low average while already armed; the original arm time is kept.
    StillArmed,
    /// High average while armed; the output clears immediately.
    Disarmed,
    /// High average while idle.
    StillIdle,
    /// Average inside the dead band; nothing changes.
    DeadBand,
}

/// Result of resolving a full averaging window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Resolution {
    pub average: FrequencySample,
    pub transition: TriggerTransition,
}

/// Debounced, hysteresis-based metal detector trigger.
#[derive(Clone, Debug)]
pub struct FrequencyMonitor<I> {
    config: DetectorConfig,
    window: AveragingWindow,
    trigger: DebounceTimer<I>,
    last_average: Option<FrequencySample>,
}

impl<I> FrequencyMonitor<I>
where
    I: Timestamp,
{
    /// Creates an idle monitor with an empty window.
    #[must_use]
    pub const fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            window: AveragingWindow::new(config.window_size),
            trigger: DebounceTimer::new(),
            last_average: None,
        }
    }

    /// Returns the configuration in use.
    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Feeds one raw reading. Readings outside the acceptance band are dropped.
    ///
    /// Returns `true` when the sample was accumulated.
    pub fn observe(&mut self, sample: FrequencySample) -> bool {
        if !self.config.accepts(sample) {
            return false;
        }
        self.window.push(sample)
    }

    /// Returns `true` once the window holds the configured number of samples.
    #[must_use]
    pub const fn window_full(&self) -> bool {
        self.window.is_full()
    }

    /// Returns the current averaging window.
    #[must_use]
    pub const fn window(&self) -> &AveragingWindow {
        &self.window
    }

    /// Resolves a full window against the hysteresis thresholds.
    ///
    /// Returns `None`, leaving all state untouched, when the window is not
    /// full. Otherwise the window is reset regardless of the outcome.
    pub fn resolve(&mut self, now: I) -> Option<Resolution> {
        let average = self.window.take_average()?;
        self.last_average = Some(average);

        let transition = if average.hz() < self.config.arm_below_hz {
            if self.trigger.start(now) {
                TriggerTransition::Armed
            } else {
                TriggerTransition::StillArmed
            }
        } else if average.hz() > self.config.disarm_above_hz {
            if self.trigger.clear() {
                TriggerTransition::Disarmed
            } else {
                TriggerTransition::StillIdle
            }
        } else {
            TriggerTransition::DeadBand
        };

        Some(Resolution {
            average,
            transition,
        })
    }

    /// Returns `true` while the trigger is armed, debounced or not.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.trigger.is_running()
    }

    /// Timestamp recorded when the current armed episode began.
    #[must_use]
    pub const fn armed_since(&self) -> Option<I> {
        self.trigger.started_at()
    }

    /// Most recent resolved average, if any window has resolved yet.
    #[must_use]
    pub const fn last_average(&self) -> Option<FrequencySample> {
        self.last_average
    }

    /// Level the trigger output should be driven to at `now`.
    ///
    /// True only when armed for strictly longer than the debounce window.
    #[must_use]
    pub fn output_signal(&self, now: I) -> bool {
        self.trigger.elapsed_exceeds(now, self.config.debounce)
    }
}

impl<I> Default for FrequencyMonitor<I>
where
    I: Timestamp,
{
    fn default() -> Self {
        Self::new(DEFAULT_DETECTOR_CONFIG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    struct MockInstant(u64);

    impl MockInstant {
        fn millis(value: u64) -> Self {
            Self(value)
        }
    }

    impl Timestamp for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }

        fn checked_add(&self, duration: Duration) -> Option<Self> {
            let millis = u64::try_from(duration.as_millis()).ok()?;
            self.0.checked_add(millis).map(Self)
        }
    }

    fn fill(monitor: &mut FrequencyMonitor<MockInstant>, hz: u32) {
        for _ in 0..WINDOW_SIZE {
            assert!(monitor.observe(FrequencySample::from_hz(hz)));
        }
        assert!(monitor.window_full());
    }

    #[test]
    fn default_config_is_consistent() {
        assert_eq!(DEFAULT_DETECTOR_CONFIG.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let config = DetectorConfig::new(8_000, 9_500, 20, 9_100, 9_000, TRIGGER_DEBOUNCE);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedHysteresis {
                arm_below_hz: 9_100,
                disarm_above_hz: 9_000,
            })
        );
    }

    #[test]
    fn validate_rejects_empty_band_and_window() {
        let band = DetectorConfig::new(9_500, 9_500, 20, 8_900, 9_000, TRIGGER_DEBOUNCE);
        assert!(matches!(
            band.validate(),
            Err(ConfigError::EmptyAcceptanceBand { .. })
        ));

        let window = DetectorConfig::new(8_000, 9_500, 0, 8_900, 9_000, TRIGGER_DEBOUNCE);
        assert_eq!(window.validate(), Err(ConfigError::EmptyWindow));
    }

    #[test]
    fn pulse_widths_convert_to_hertz() {
        assert_eq!(
            FrequencySample::from_pulse_widths(57, 58),
            Some(FrequencySample::from_hz(8_695))
        );
        assert_eq!(FrequencySample::from_pulse_widths(0, 0), None);
    }

    #[test]
    fn acceptance_band_bounds_are_exclusive() {
        let mut monitor = FrequencyMonitor::<MockInstant>::default();
        assert!(!monitor.observe(FrequencySample::from_hz(8_000)));
        assert!(!monitor.observe(FrequencySample::from_hz(9_500)));
        assert!(monitor.observe(FrequencySample::from_hz(8_001)));
        assert!(monitor.observe(FrequencySample::from_hz(9_499)));
        assert_eq!(monitor.window().count(), 2);
    }

    #[test]
    fn out_of_band_samples_never_fill_window() {
        let mut monitor = FrequencyMonitor::<MockInstant>::default();
        for _ in 0..WINDOW_SIZE - 1 {
            monitor.observe(FrequencySample::from_hz(8_700));
        }
        for hz in (0..10_000).step_by(7).filter(|hz| !(8_001..9_500).contains(hz)) {
            assert!(!monitor.observe(FrequencySample::from_hz(hz)));
        }
        assert_eq!(monitor.window().count(), WINDOW_SIZE - 1);
        assert!(!monitor.window_full());
        assert_eq!(monitor.resolve(MockInstant::millis(0)), None);
    }

    #[test]
    fn low_average_arms_once_and_keeps_first_timestamp() {
        let mut monitor = FrequencyMonitor::<MockInstant>::default();

        fill(&mut monitor, 8_700);
        let first = monitor.resolve(MockInstant::millis(40)).expect("window full");
        assert_eq!(first.transition, TriggerTransition::Armed);
        assert_eq!(first.average, FrequencySample::from_hz(8_700));
        assert_eq!(monitor.window().count(), 0);

        fill(&mut monitor, 8_650);
        let second = monitor.resolve(MockInstant::millis(90)).expect("window full");
        assert_eq!(second.transition, TriggerTransition::StillArmed);
        assert_eq!(monitor.armed_since(), Some(MockInstant::millis(40)));
    }

    #[test]
    fn output_asserts_strictly_after_debounce() {
        let mut monitor = FrequencyMonitor::<MockInstant>::default();
        fill(&mut monitor, 8_700);
        monitor.resolve(MockInstant::millis(1_000));

        assert!(!monitor.output_signal(MockInstant::millis(1_099)));
        assert!(!monitor.output_signal(MockInstant::millis(1_100)));
        assert!(monitor.output_signal(MockInstant::millis(1_101)));
    }

    #[test]
    fn high_average_clears_output_immediately() {
        let mut monitor = FrequencyMonitor::<MockInstant>::default();
        fill(&mut monitor, 8_700);
        monitor.resolve(MockInstant::millis(0));
        assert!(monitor.output_signal(MockInstant::millis(5_000)));

        fill(&mut monitor, 9_200);
        let resolution = monitor.resolve(MockInstant::millis(5_000)).expect("window full");
        assert_eq!(resolution.transition, TriggerTransition::Disarmed);
        assert!(!monitor.is_armed());
        assert!(!monitor.output_signal(MockInstant::millis(5_000)));
        assert!(!monitor.output_signal(MockInstant::millis(60_000)));
    }

    #[test]
    fn dead_band_leaves_state_unchanged() {
        let mut monitor = FrequencyMonitor::<MockInstant>::default();

        fill(&mut monitor, 8_950);
        let idle = monitor.resolve(MockInstant::millis(0)).expect("window full");
        assert_eq!(idle.transition, TriggerTransition::DeadBand);
        assert!(!monitor.is_armed());

        fill(&mut monitor, 8_800);
        monitor.resolve(MockInstant::millis(10));

        for hz in [8_900, 9_000] {
            fill(&mut monitor, hz);
            let held = monitor.resolve(MockInstant::millis(500)).expect("window full");
            assert_eq!(held.transition, TriggerTransition::DeadBand);
        }
        assert_eq!(monitor.armed_since(), Some(MockInstant::millis(10)));
        assert!(monitor.output_signal(MockInstant::millis(500)));
    }

    #[test]
    fn output_signal_is_idempotent() {
        let mut monitor = FrequencyMonitor::<MockInstant>::default();
        fill(&mut monitor, 8_700);
        monitor.resolve(MockInstant::millis(0));

        let now = MockInstant::millis(250);
        let first = monitor.output_signal(now);
        for _ in 0..5 {
            assert_eq!(monitor.output_signal(now), first);
        }
        assert!(first);
    }

    #[test]
    fn high_average_while_idle_reports_still_idle() {
        let mut monitor = FrequencyMonitor::<MockInstant>::default();
        fill(&mut monitor, 9_300);
        let resolution = monitor.resolve(MockInstant::millis(0)).expect("window full");
        assert_eq!(resolution.transition, TriggerTransition::StillIdle);
        assert_eq!(monitor.last_average(), Some(FrequencySample::from_hz(9_300)));
    }
}
