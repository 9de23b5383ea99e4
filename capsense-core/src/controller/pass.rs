//! Step-wise form of one controller pass.
//!
//! [`Controller::begin_pass`] and [`Controller::resume_pass`] hand out one
//! [`PassRequest`] at a time and expect the matching [`PassInput`] back. The
//! caller performs the hardware work however it likes, blocking or awaited,
//! while the ordering of the pass stays here.

use heapless::Vec;

use super::{Controller, FrequencyStep, PassReport};
use crate::detector::FrequencySample;
use crate::keypad::{CapacitiveReading, KeyIndex, MAX_KEYS, ToneAction, UnlockAction};
use crate::timing::Timestamp;

/// Hardware work the pass needs before it can continue.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PassRequest {
    /// Time one oscillator period; answer with [`PassInput::Frequency`].
    ReadFrequency,
    /// Drive the trigger output; answer with [`PassInput::Done`].
    SetTrigger(bool),
    /// Prepare the pads for a scan; answer with [`PassInput::Done`].
    BeginScan,
    /// Read one pad; answer with [`PassInput::Reading`].
    ReadKey { key: KeyIndex, samples: u8 },
    /// Play the tone for its full hold; answer with [`PassInput::Done`].
    PlayTone(ToneAction),
    /// Pulse the unlock output for its full hold; answer with [`PassInput::Done`].
    HoldUnlock(UnlockAction),
}

/// Answer to the previous [`PassRequest`].
///
/// An answer of the wrong kind counts as a timed-out frequency reading or an
/// idle pad.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PassInput {
    Frequency(Option<FrequencySample>),
    Reading(CapacitiveReading),
    Done,
}

impl PassInput {
    fn frequency(self) -> Option<FrequencySample> {
        match self {
            PassInput::Frequency(sample) => sample,
            _ => None,
        }
    }

    fn reading(self) -> CapacitiveReading {
        match self {
            PassInput::Reading(reading) => reading,
            _ => CapacitiveReading::new(0),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Stage {
    AwaitFrequency,
    AwaitTrigger,
    AwaitScanStart,
    AwaitReading { index: usize },
    AwaitTone {
        index: usize,
        unlock: Option<UnlockAction>,
    },
    AwaitUnlock,
    Finished,
}

/// In-flight pass. Finish it with [`Pass::into_report`].
#[derive(Clone, Debug)]
pub struct Pass<I> {
    stage: Stage,
    started_at: I,
    step: FrequencyStep,
    trigger: bool,
    keys: Vec<KeyIndex, MAX_KEYS>,
    unlock: Option<UnlockAction>,
}

impl<I> Pass<I>
where
    I: Copy,
{
    /// Returns `true` once [`Controller::resume_pass`] has nothing left to ask.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Finished
    }

    #[must_use]
    pub fn into_report(self) -> PassReport<I> {
        PassReport {
            started_at: self.started_at,
            step: self.step,
            trigger: self.trigger,
            keys: self.keys,
            unlock: self.unlock,
        }
    }
}

impl<I> Controller<I>
where
    I: Timestamp,
{
    /// Starts a pass at `now`: resolves a full window, otherwise asks for a reading.
    pub fn begin_pass(&mut self, now: I) -> (Pass<I>, PassRequest) {
        let mut pass = Pass {
            stage: Stage::AwaitFrequency,
            started_at: now,
            step: FrequencyStep::Sampled {
                sample: None,
                accepted: false,
            },
            trigger: false,
            keys: Vec::new(),
            unlock: None,
        };

        if let Some(resolution) = self.resolve_window(now) {
            pass.step = FrequencyStep::Resolved(resolution);
            let request = self.drive_trigger(&mut pass, now);
            return (pass, request);
        }
        (pass, PassRequest::ReadFrequency)
    }

    /// Feeds the answer to the last request and returns the next one.
    ///
    /// `None` means the pass is finished. The scan stops at the pad that
    /// completes the combination; remaining pads are read again next pass.
    pub fn resume_pass(
        &mut self,
        pass: &mut Pass<I>,
        input: PassInput,
        now: I,
    ) -> Option<PassRequest> {
        match pass.stage {
            Stage::AwaitFrequency => {
                let sample = input.frequency();
                let accepted = self.observe_sample(sample);
                pass.step = FrequencyStep::Sampled { sample, accepted };
                Some(self.drive_trigger(pass, now))
            }
            Stage::AwaitTrigger => {
                pass.stage = Stage::AwaitScanStart;
                Some(PassRequest::BeginScan)
            }
            Stage::AwaitScanStart => self.read_from(pass, 0),
            Stage::AwaitReading { index } => {
                let key = self.keypad.keys().nth(index)?;
                if !self.keypad.is_active(input.reading()) {
                    return self.read_from(pass, index + 1);
                }

                let response = self.key_event(key, now);
                // `keypad.keys()` yields at most MAX_KEYS pads.
                let _ = pass.keys.push(key);
                let unlock = response.unlock();
                if let Some(tone) = response.tone {
                    pass.stage = Stage::AwaitTone { index, unlock };
                    return Some(PassRequest::PlayTone(tone));
                }
                match unlock {
                    Some(action) => Some(Self::request_unlock(pass, action)),
                    None => self.read_from(pass, index + 1),
                }
            }
            Stage::AwaitTone { index, unlock } => match unlock {
                Some(action) => Some(Self::request_unlock(pass, action)),
                None => self.read_from(pass, index + 1),
            },
            Stage::AwaitUnlock | Stage::Finished => {
                pass.stage = Stage::Finished;
                None
            }
        }
    }

    fn drive_trigger(&mut self, pass: &mut Pass<I>, now: I) -> PassRequest {
        pass.trigger = self.trigger_level(now);
        pass.stage = Stage::AwaitTrigger;
        PassRequest::SetTrigger(pass.trigger)
    }

    fn read_from(&self, pass: &mut Pass<I>, index: usize) -> Option<PassRequest> {
        let Some(key) = self.keypad.keys().nth(index) else {
            pass.stage = Stage::Finished;
            return None;
        };
        pass.stage = Stage::AwaitReading { index };
        Some(PassRequest::ReadKey {
            key,
            samples: self.keypad.samples,
        })
    }

    fn request_unlock(pass: &mut Pass<I>, action: UnlockAction) -> PassRequest {
        pass.unlock = Some(action);
        pass.stage = Stage::AwaitUnlock;
        PassRequest::HoldUnlock(action)
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::detector::WINDOW_SIZE;
    use crate::keypad::{NOTE_C4, TONE_HOLD};

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
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

    const IDLE: PassInput = PassInput::Reading(CapacitiveReading::new(20));
    const TOUCHED: PassInput = PassInput::Reading(CapacitiveReading::new(400));

    fn read(raw: u8) -> PassRequest {
        PassRequest::ReadKey {
            key: KeyIndex::new(raw),
            samples: 10,
        }
    }

    #[test]
    fn idle_pass_requests_every_pad_in_order() {
        let mut controller = Controller::<MockInstant>::default();
        let now = MockInstant(0);
        let (mut pass, first) = controller.begin_pass(now);
        assert_eq!(first, PassRequest::ReadFrequency);

        let sample = PassInput::Frequency(Some(FrequencySample::from_hz(9_200)));
        let mut requests: Vec<PassRequest, 8> = Vec::new();
        let mut next = controller.resume_pass(&mut pass, sample, now);
        while let Some(request) = next {
            requests.push(request).unwrap();
            let input = match request {
                PassRequest::ReadKey { .. } => IDLE,
                _ => PassInput::Done,
            };
            next = controller.resume_pass(&mut pass, input, now);
        }

        assert_eq!(
            requests.as_slice(),
            &[
                PassRequest::SetTrigger(false),
                PassRequest::BeginScan,
                read(0),
                read(1),
                read(2),
                read(3),
            ]
        );
        assert!(pass.is_finished());
        let report = pass.into_report();
        assert!(matches!(
            report.step,
            FrequencyStep::Sampled { accepted: true, .. }
        ));
        assert!(report.keys.is_empty());
    }

    #[test]
    fn full_window_resolves_without_a_reading() {
        let mut controller = Controller::<MockInstant>::default();
        for _ in 0..WINDOW_SIZE {
            controller.observe_sample(Some(FrequencySample::from_hz(8_700)));
        }

        let (pass, first) = controller.begin_pass(MockInstant(5));
        assert_eq!(first, PassRequest::SetTrigger(false));
        assert!(matches!(pass.step, FrequencyStep::Resolved(_)));
        assert!(controller.monitor().is_armed());
    }

    #[test]
    fn touched_pad_asks_for_its_tone_before_the_next_pad() {
        let mut controller = Controller::<MockInstant>::default();
        let now = MockInstant(0);
        let (mut pass, _) = controller.begin_pass(now);
        controller.resume_pass(&mut pass, PassInput::Frequency(None), now);
        controller.resume_pass(&mut pass, PassInput::Done, now);
        assert_eq!(
            controller.resume_pass(&mut pass, PassInput::Done, now),
            Some(read(0))
        );

        assert_eq!(
            controller.resume_pass(&mut pass, TOUCHED, now),
            Some(PassRequest::PlayTone(ToneAction::new(NOTE_C4, TONE_HOLD)))
        );
        assert_eq!(
            controller.resume_pass(&mut pass, PassInput::Done, now),
            Some(read(1))
        );
        assert_eq!(controller.matcher().position(), 1);
    }

    #[test]
    fn wrong_answers_count_as_timeouts_and_idle_pads() {
        let mut controller = Controller::<MockInstant>::default();
        let now = MockInstant(0);
        let (mut pass, _) = controller.begin_pass(now);
        controller.resume_pass(&mut pass, PassInput::Done, now);
        controller.resume_pass(&mut pass, PassInput::Done, now);
        controller.resume_pass(&mut pass, PassInput::Done, now);

        assert_eq!(
            controller.resume_pass(&mut pass, PassInput::Done, now),
            Some(read(1))
        );
        assert_eq!(controller.monitor().window().count(), 0);
        assert_eq!(controller.matcher().position(), 0);
    }
}
