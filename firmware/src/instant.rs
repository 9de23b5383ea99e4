#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Embassy clock adapter for the core timing trait.

use capsense_core::timing::Timestamp;
use embassy_time::{Duration, Instant};

/// Monotonic timestamp backed by the embassy time driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Reads the time driver.
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Timestamp for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        embassy_duration_to_core(self.0.saturating_duration_since(earlier.0))
    }

    fn checked_add(&self, duration: core::time::Duration) -> Option<Self> {
        self.0.checked_add(core_duration_to_embassy(duration)).map(Self)
    }
}

pub fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

pub fn embassy_duration_to_core(duration: Duration) -> core::time::Duration {
    core::time::Duration::from_micros(duration.as_micros())
}
