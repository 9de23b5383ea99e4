//! Single-loop controller tying the detector and the keypad together.
//!
//! Each pass performs one frequency step (acquire a sample, or resolve a full
//! window), drives the trigger output from the debounced level, then scans
//! every pad in index order. The ordering lives in [`Pass`]: [`Controller::poll`]
//! drives it through the collaborator traits below, and async callers drive it
//! request by request with [`Controller::begin_pass`] and
//! [`Controller::resume_pass`].
//!
//! Blocking waits never happen here. Tones and the unlock pulse are handed to
//! [`ControlOutputs`] as [`HoldAction`](crate::timing::HoldAction)s and the
//! implementation decides how to honour the hold against its own clock.

mod pass;

use heapless::Vec;

pub use pass::{Pass, PassInput, PassRequest};

use crate::config::ConfigError;
use crate::console::status::StatusSnapshot;
use crate::detector::{
    DEFAULT_DETECTOR_CONFIG, DetectorConfig, FrequencyMonitor, FrequencySample, Resolution,
    TriggerTransition,
};
use crate::keypad::{
    CapacitiveReading, DEFAULT_KEYPAD_CONFIG, KeyIndex, KeypadConfig, MAX_KEYS, MatchOutcome,
    SequenceMatcher, ToneAction, UnlockAction,
};
use crate::telemetry::{
    SequenceTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryRecorder,
};
use crate::timing::Timestamp;

/// Monotonic clock read at every decision point.
pub trait Clock {
    type Instant: Timestamp;

    fn now(&self) -> Self::Instant;
}

/// Raw frequency acquisition from the search-coil oscillator.
pub trait FrequencySource {
    /// Measures one period. `None` means the measurement timed out.
    fn read_frequency(&mut self) -> Option<FrequencySample>;
}

/// Capacitive pad measurement.
pub trait KeySensor {
    /// Called once before each scan over all pads.
    fn begin_scan(&mut self) {}

    /// Sums `samples` charge-time measurements for `key`.
    fn read_key(&mut self, key: KeyIndex, samples: u8) -> CapacitiveReading;
}

/// Output lines driven by the controller.
pub trait ControlOutputs {
    /// Drives the trigger output to the given level.
    fn set_trigger(&mut self, high: bool);

    /// Plays feedback for an activated pad. Returns once the hold is honoured.
    fn play_tone(&mut self, action: ToneAction);

    /// Pulses the unlock output. Returns once the hold is honoured.
    fn hold_unlock(&mut self, action: UnlockAction);
}

/// Everything [`Controller::poll`] needs from a platform.
pub trait ControlHardware: Clock + FrequencySource + KeySensor + ControlOutputs {}

impl<T> ControlHardware for T where T: Clock + FrequencySource + KeySensor + ControlOutputs {}

/// Outcome of the frequency half of a pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrequencyStep {
    /// One raw reading was taken; `accepted` reports whether it was in band.
    Sampled {
        sample: Option<FrequencySample>,
        accepted: bool,
    },
    /// The full window was resolved instead of sampling.
    Resolved(Resolution),
}

/// Result of feeding one activated pad to the keypad.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyResponse {
    pub key: KeyIndex,
    pub tone: Option<ToneAction>,
    pub outcome: MatchOutcome,
}

impl KeyResponse {
    /// Unlock action emitted by this key, if it completed the combination.
    #[must_use]
    pub const fn unlock(&self) -> Option<UnlockAction> {
        self.outcome.unlock()
    }
}

/// Summary of one loop iteration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PassReport<I> {
    /// Timestamp taken at the start of the pass.
    pub started_at: I,
    pub step: FrequencyStep,
    /// Trigger output level driven this pass.
    pub trigger: bool,
    /// Pads found active, in scan order.
    pub keys: Vec<KeyIndex, MAX_KEYS>,
    pub unlock: Option<UnlockAction>,
}

/// Owns both state machines and the telemetry ring.
pub struct Controller<I>
where
    I: Copy,
{
    monitor: FrequencyMonitor<I>,
    matcher: SequenceMatcher,
    keypad: KeypadConfig,
    telemetry: TelemetryRecorder<I>,
    trigger_asserted: bool,
}

impl<I> Controller<I>
where
    I: Timestamp,
{
    /// Creates a controller without validating the tables.
    #[must_use]
    pub const fn new(detector: DetectorConfig, keypad: KeypadConfig) -> Self {
        Self {
            monitor: FrequencyMonitor::new(detector),
            matcher: SequenceMatcher::new(keypad.sequence, keypad.unlock_hold),
            keypad,
            telemetry: TelemetryRecorder::new(),
            trigger_asserted: false,
        }
    }

    /// Creates a controller after checking both tables.
    pub fn try_new(detector: DetectorConfig, keypad: KeypadConfig) -> Result<Self, ConfigError> {
        detector.validate()?;
        keypad.validate()?;
        Ok(Self::new(detector, keypad))
    }

    #[must_use]
    pub const fn monitor(&self) -> &FrequencyMonitor<I> {
        &self.monitor
    }

    #[must_use]
    pub const fn matcher(&self) -> &SequenceMatcher {
        &self.matcher
    }

    #[must_use]
    pub const fn keypad(&self) -> &KeypadConfig {
        &self.keypad
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<I> {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut TelemetryRecorder<I> {
        &mut self.telemetry
    }

    /// Returns `true` when the next frequency step will take a reading.
    #[must_use]
    pub const fn wants_sample(&self) -> bool {
        !self.monitor.window_full()
    }

    /// Feeds one raw reading. Timed-out readings are dropped like out-of-band ones.
    pub fn observe_sample(&mut self, sample: Option<FrequencySample>) -> bool {
        sample.is_some_and(|sample| self.monitor.observe(sample))
    }

    /// Resolves the window if it is full and records the outcome.
    pub fn resolve_window(&mut self, now: I) -> Option<Resolution> {
        let armed_for = self
            .monitor
            .armed_since()
            .map(|since| now.saturating_duration_since(since));
        let resolution = self.monitor.resolve(now)?;
        self.telemetry
            .record_resolution(resolution.average, resolution.transition, armed_for, now);
        if resolution.transition == TriggerTransition::Disarmed {
            self.trigger_asserted = false;
        }
        Some(resolution)
    }

    /// Resolves a full window, otherwise acquires and observes one reading.
    pub fn frequency_step<S>(&mut self, now: I, source: &mut S) -> FrequencyStep
    where
        S: FrequencySource + ?Sized,
    {
        if let Some(resolution) = self.resolve_window(now) {
            return FrequencyStep::Resolved(resolution);
        }
        let sample = source.read_frequency();
        let accepted = self.observe_sample(sample);
        FrequencyStep::Sampled { sample, accepted }
    }

    /// Debounced trigger level at `now`. Records the rising edge.
    pub fn trigger_level(&mut self, now: I) -> bool {
        let level = self.monitor.output_signal(now);
        if level && !self.trigger_asserted {
            let armed_for = self
                .monitor
                .armed_since()
                .map(|since| now.saturating_duration_since(since));
            self.telemetry.record_trigger_asserted(armed_for, now);
        }
        self.trigger_asserted = level;
        level
    }

    /// Feeds one activated pad to the matcher and looks up its tone.
    pub fn key_event(&mut self, key: KeyIndex, now: I) -> KeyResponse {
        self.telemetry.record(
            TelemetryEventKind::KeyActivated(key),
            TelemetryPayload::none(),
            now,
        );

        let outcome = self.matcher.advance(key);
        let sequence_len = self.matcher.target().len();
        let (event, payload) = match outcome {
            MatchOutcome::Advanced { position } => (
                TelemetryEventKind::SequenceAdvanced,
                TelemetryPayload::Sequence(SequenceTelemetry::new(key, position, sequence_len)),
            ),
            MatchOutcome::Reset { from } => (
                TelemetryEventKind::SequenceReset,
                TelemetryPayload::Sequence(SequenceTelemetry::new(key, from, sequence_len)),
            ),
            MatchOutcome::Completed(action) => (
                TelemetryEventKind::Unlocked,
                TelemetryPayload::Unlock { hold: action.hold },
            ),
        };
        self.telemetry.record(event, payload, now);

        KeyResponse {
            key,
            tone: self.keypad.tone_action(key),
            outcome,
        }
    }

    /// Runs one full loop iteration against `hw`.
    ///
    /// The scan stops at the pad that completes the combination; remaining
    /// pads are read again on the next pass.
    pub fn poll<H>(&mut self, hw: &mut H) -> PassReport<I>
    where
        H: ControlHardware<Instant = I> + ?Sized,
    {
        let (mut pass, mut request) = self.begin_pass(hw.now());
        loop {
            let input = match request {
                PassRequest::ReadFrequency => PassInput::Frequency(hw.read_frequency()),
                PassRequest::SetTrigger(high) => {
                    hw.set_trigger(high);
                    PassInput::Done
                }
                PassRequest::BeginScan => {
                    hw.begin_scan();
                    PassInput::Done
                }
                PassRequest::ReadKey { key, samples } => {
                    PassInput::Reading(hw.read_key(key, samples))
                }
                PassRequest::PlayTone(tone) => {
                    hw.play_tone(tone);
                    PassInput::Done
                }
                PassRequest::HoldUnlock(action) => {
                    hw.hold_unlock(action);
                    PassInput::Done
                }
            };
            match self.resume_pass(&mut pass, input, hw.now()) {
                Some(next) => request = next,
                None => return pass.into_report(),
            }
        }
    }

    /// Point-in-time view of both state machines.
    #[must_use]
    pub fn status(&self, now: I) -> StatusSnapshot {
        let window = self.monitor.window();
        StatusSnapshot {
            average_hz: self.monitor.last_average().map(FrequencySample::hz),
            window_count: window.count(),
            window_size: window.size(),
            armed: self.monitor.is_armed(),
            armed_for: self
                .monitor
                .armed_since()
                .map(|since| now.saturating_duration_since(since)),
            trigger: self.monitor.output_signal(now),
            position: self.matcher.position(),
            sequence_len: self.matcher.target().len(),
        }
    }
}

impl<I> Default for Controller<I>
where
    I: Timestamp,
{
    fn default() -> Self {
        Self::new(DEFAULT_DETECTOR_CONFIG, DEFAULT_KEYPAD_CONFIG)
    }
}
