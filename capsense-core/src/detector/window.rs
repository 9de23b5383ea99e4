//! Fixed-count averaging window for accepted frequency samples.

use super::FrequencySample;

/// Accumulates accepted samples until a fixed count is reached.
///
/// `count` never exceeds the configured size; [`AveragingWindow::push`]
/// refuses samples once the window is full and [`AveragingWindow::take_average`]
/// resets both fields.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AveragingWindow {
    sum: u32,
    count: u8,
    size: u8,
}

impl AveragingWindow {
    /// Creates an empty window that resolves after `size` samples.
    #[must_use]
    pub const fn new(size: u8) -> Self {
        Self {
            sum: 0,
            count: 0,
            size,
        }
    }

    /// Adds a sample. Returns `false` when the window was already full.
    pub fn push(&mut self, sample: FrequencySample) -> bool {
        if self.count >= self.size {
            return false;
        }
        self.sum = self.sum.saturating_add(sample.hz());
        self.count += 1;
        true
    }

    /// Number of samples accumulated so far.
    #[must_use]
    pub const fn count(&self) -> u8 {
        self.count
    }

    /// Configured number of samples per resolution.
    #[must_use]
    pub const fn size(&self) -> u8 {
        self.size
    }

    /// Running sum of the accepted samples.
    #[must_use]
    pub const fn sum(&self) -> u32 {
        self.sum
    }

    /// Returns `true` once exactly `size` samples are held.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.size > 0 && self.count >= self.size
    }

    /// Resolves a full window into its truncated average and resets it.
    ///
    /// Returns `None` without touching the window when it is not full, so an
    /// empty window can never be divided.
    pub fn take_average(&mut self) -> Option<FrequencySample> {
        if !self.is_full() {
            return None;
        }
        let average = self.sum / u32::from(self.count);
        self.clear();
        Some(FrequencySample::from_hz(average))
    }

    /// Drops any partial accumulation.
    pub fn clear(&mut self) {
        self.sum = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_truncated_average_and_resets() {
        let mut window = AveragingWindow::new(3);
        assert!(window.push(FrequencySample::from_hz(8_700)));
        assert!(window.push(FrequencySample::from_hz(8_701)));
        assert_eq!(window.take_average(), None);
        assert!(window.push(FrequencySample::from_hz(8_701)));

        assert_eq!(window.take_average(), Some(FrequencySample::from_hz(8_700)));
        assert_eq!(window.count(), 0);
        assert_eq!(window.sum(), 0);
    }

    #[test]
    fn refuses_samples_once_full() {
        let mut window = AveragingWindow::new(2);
        window.push(FrequencySample::from_hz(9_000));
        window.push(FrequencySample::from_hz(9_000));
        assert!(!window.push(FrequencySample::from_hz(1)));
        assert_eq!(window.count(), 2);
        assert_eq!(window.sum(), 18_000);
    }

    #[test]
    fn zero_sized_window_never_fills() {
        let mut window = AveragingWindow::new(0);
        assert!(!window.push(FrequencySample::from_hz(8_500)));
        assert!(!window.is_full());
        assert_eq!(window.take_average(), None);
    }
}
