//! Simulated oscillator, pads and outputs on a virtual millisecond clock.
//!
//! Every collaborator call that takes time on the device moves the clock
//! forward instead of sleeping, so holds and debounce windows play out
//! deterministically.

use std::collections::VecDeque;
use std::time::Duration;

use capsense_core::controller::{Clock, ControlOutputs, FrequencySource, KeySensor};
use capsense_core::detector::FrequencySample;
use capsense_core::keypad::{CapacitiveReading, KeyIndex, ToneAction, UnlockAction};
use capsense_core::timing::Timestamp;

/// Oscillator frequency with no metal near the coil.
pub const CLEAR_HZ: u32 = 9_200;
/// Oscillator frequency with metal under the coil.
pub const METAL_HZ: u32 = 8_700;

/// Clock cost of timing one oscillator period.
pub const SAMPLE_COST: Duration = Duration::from_millis(1);
/// Clock cost of one scan over every pad.
pub const SCAN_COST: Duration = Duration::from_millis(1);

const JITTER_HZ: [i32; 8] = [-40, 25, -10, 35, -20, 0, 15, -30];
/// Every Nth reading is a glitch far outside the acceptance band.
const GLITCH_EVERY: u64 = 11;
const GLITCH_HZ: u32 = 2_500;

const TOUCHED_READING: u32 = 400;
const IDLE_READING: u32 = 20;

/// Virtual timestamp in milliseconds since the rig powered on.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl SimInstant {
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl Timestamp for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    fn checked_add(&self, duration: Duration) -> Option<Self> {
        let millis = u64::try_from(duration.as_millis()).ok()?;
        self.0.checked_add(millis).map(Self)
    }
}

/// Host stand-in for the detector coil, the pads and the output lines.
#[derive(Debug)]
pub struct SimRig {
    now: SimInstant,
    frequency_hz: u32,
    readings: u64,
    since_glitch: u64,
    touches: VecDeque<KeyIndex>,
    touched: Option<KeyIndex>,
    trigger: bool,
    unlock_count: u32,
}

impl SimRig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: SimInstant::default(),
            frequency_hz: CLEAR_HZ,
            readings: 0,
            since_glitch: 0,
            touches: VecDeque::new(),
            touched: None,
            trigger: false,
            unlock_count: 0,
        }
    }

    /// Sets the oscillator frequency. Zero simulates a stalled oscillator.
    pub fn set_frequency(&mut self, hz: u32) {
        self.frequency_hz = hz;
    }

    #[must_use]
    pub const fn frequency(&self) -> u32 {
        self.frequency_hz
    }

    /// Queues pad touches; each scan consumes one.
    pub fn queue_touches<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = KeyIndex>,
    {
        self.touches.extend(keys);
    }

    #[must_use]
    pub fn pending_touches(&self) -> usize {
        self.touches.len()
    }

    #[must_use]
    pub const fn trigger(&self) -> bool {
        self.trigger
    }

    #[must_use]
    pub const fn unlock_count(&self) -> u32 {
        self.unlock_count
    }

    fn advance(&mut self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.now = SimInstant(self.now.0.saturating_add(millis));
    }
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimRig {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        self.now
    }
}

impl FrequencySource for SimRig {
    fn read_frequency(&mut self) -> Option<FrequencySample> {
        self.advance(SAMPLE_COST);
        if self.frequency_hz == 0 {
            return None;
        }

        self.readings += 1;
        self.since_glitch += 1;
        if self.since_glitch == GLITCH_EVERY {
            self.since_glitch = 0;
            return Some(FrequencySample::from_hz(
                self.frequency_hz.saturating_add(GLITCH_HZ),
            ));
        }

        let slot = usize::try_from(self.readings % 8).unwrap_or(0);
        let hz = self.frequency_hz.saturating_add_signed(JITTER_HZ[slot]);
        Some(FrequencySample::from_hz(hz))
    }
}

impl KeySensor for SimRig {
    fn begin_scan(&mut self) {
        self.advance(SCAN_COST);
        self.touched = self.touches.pop_front();
    }

    fn read_key(&mut self, key: KeyIndex, _samples: u8) -> CapacitiveReading {
        if self.touched == Some(key) {
            CapacitiveReading::new(TOUCHED_READING)
        } else {
            CapacitiveReading::new(IDLE_READING)
        }
    }
}

impl ControlOutputs for SimRig {
    fn set_trigger(&mut self, high: bool) {
        self.trigger = high;
    }

    fn play_tone(&mut self, action: ToneAction) {
        self.advance(action.hold);
    }

    fn hold_unlock(&mut self, action: UnlockAction) {
        if action.value {
            self.unlock_count += 1;
        }
        self.advance(action.hold);
    }
}
