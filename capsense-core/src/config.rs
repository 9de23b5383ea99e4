//! Build-time configuration checks.
//!
//! Thresholds, the key map and the unlock combination are `const` data. The
//! [`ConfigError`] values below are produced by the `validate` methods on
//! [`DetectorConfig`](crate::detector::DetectorConfig) and
//! [`KeypadConfig`](crate::keypad::KeypadConfig) so a bad table is caught in
//! tests instead of on the device.

use core::fmt;

/// Reasons a static configuration table is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The acceptance band is empty (`min >= max`).
    EmptyAcceptanceBand { min_hz: u32, max_hz: u32 },
    /// The arm threshold sits above the disarm threshold.
    InvertedHysteresis { arm_below_hz: u32, disarm_above_hz: u32 },
    /// The averaging window must hold at least one sample.
    EmptyWindow,
    /// A full window of maximum in-band samples would overflow the accumulator.
    WindowOverflow { window_size: u8 },
    /// No keys are configured.
    NoKeys,
    /// More keys are configured than a scan can report.
    TooManyKeys { count: usize },
    /// The unlock combination is empty.
    EmptySequence,
    /// The unlock combination references a key that is not wired.
    KeyOutOfRange { position: usize, key: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyAcceptanceBand { min_hz, max_hz } => {
                write!(f, "acceptance band {min_hz}..{max_hz} Hz is empty")
            }
            ConfigError::InvertedHysteresis {
                arm_below_hz,
                disarm_above_hz,
            } => write!(
                f,
                "arm threshold {arm_below_hz} Hz exceeds disarm threshold {disarm_above_hz} Hz"
            ),
            ConfigError::EmptyWindow => f.write_str("averaging window is empty"),
            ConfigError::WindowOverflow { window_size } => {
                write!(f, "window of {window_size} samples overflows the sum")
            }
            ConfigError::NoKeys => f.write_str("no keys configured"),
            ConfigError::TooManyKeys { count } => write!(f, "{count} keys configured"),
            ConfigError::EmptySequence => f.write_str("unlock sequence is empty"),
            ConfigError::KeyOutOfRange { position, key } => {
                write!(f, "sequence step {position} names unknown key {key}")
            }
        }
    }
}
