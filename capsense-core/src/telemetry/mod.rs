//! Telemetry event catalog and ring buffer shared by firmware and host targets.
//!
//! Every state change the control loop makes is captured as a
//! [`TelemetryRecord`] in a fixed-size ring. Event kinds encode to compact
//! numeric codes so the firmware can forward them over defmt and the emulator
//! can print or transcript them without allocating.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::detector::{FrequencySample, TriggerTransition};
use crate::keypad::KeyIndex;
use crate::timing::Timestamp;

/// Monotonic identifier attached to each record. Wraps on overflow.
pub type EventId = u32;

/// Discriminated telemetry events emitted by the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    /// An averaging window resolved.
    WindowResolved,
    /// A low average started a new armed episode.
    TriggerArmed,
    /// The debounced trigger output went high.
    TriggerAsserted,
    /// A high average ended the armed episode.
    TriggerDisarmed,
    /// A pad read above the touch threshold.
    KeyActivated(KeyIndex),
    /// The combination cursor moved forward.
    SequenceAdvanced,
    /// A mismatching key sent the cursor back to zero.
    SequenceReset,
    /// The full combination was entered.
    Unlocked,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::WindowResolved => f.write_str("window-resolved"),
            TelemetryEventKind::TriggerArmed => f.write_str("trigger-armed"),
            TelemetryEventKind::TriggerAsserted => f.write_str("trigger-asserted"),
            TelemetryEventKind::TriggerDisarmed => f.write_str("trigger-disarmed"),
            TelemetryEventKind::KeyActivated(key) => write!(f, "key-activated {key}"),
            TelemetryEventKind::SequenceAdvanced => f.write_str("sequence-advanced"),
            TelemetryEventKind::SequenceReset => f.write_str("sequence-reset"),
            TelemetryEventKind::Unlocked => f.write_str("unlocked"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const WINDOW_RESOLVED_CODE: u16 = 0x0001;
    const TRIGGER_ARMED_CODE: u16 = 0x0002;
    const TRIGGER_ASSERTED_CODE: u16 = 0x0003;
    const TRIGGER_DISARMED_CODE: u16 = 0x0004;
    const SEQUENCE_ADVANCED_CODE: u16 = 0x0008;
    const SEQUENCE_RESET_CODE: u16 = 0x0009;
    const UNLOCKED_CODE: u16 = 0x000A;
    const KEY_ACTIVATED_BASE: u16 = 0x0010;
    const KEY_ACTIVATED_END: u16 = 0x0020;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::WindowResolved => Self::WINDOW_RESOLVED_CODE,
            TelemetryEventKind::TriggerArmed => Self::TRIGGER_ARMED_CODE,
            TelemetryEventKind::TriggerAsserted => Self::TRIGGER_ASSERTED_CODE,
            TelemetryEventKind::TriggerDisarmed => Self::TRIGGER_DISARMED_CODE,
            TelemetryEventKind::KeyActivated(key) => {
                Self::KEY_ACTIVATED_BASE + u16::from(key.raw())
            }
            TelemetryEventKind::SequenceAdvanced => Self::SEQUENCE_ADVANCED_CODE,
            TelemetryEventKind::SequenceReset => Self::SEQUENCE_RESET_CODE,
            TelemetryEventKind::Unlocked => Self::UNLOCKED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant into a telemetry event, falling back to [`Custom`].
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::WINDOW_RESOLVED_CODE => TelemetryEventKind::WindowResolved,
            Self::TRIGGER_ARMED_CODE => TelemetryEventKind::TriggerArmed,
            Self::TRIGGER_ASSERTED_CODE => TelemetryEventKind::TriggerAsserted,
            Self::TRIGGER_DISARMED_CODE => TelemetryEventKind::TriggerDisarmed,
            Self::SEQUENCE_ADVANCED_CODE => TelemetryEventKind::SequenceAdvanced,
            Self::SEQUENCE_RESET_CODE => TelemetryEventKind::SequenceReset,
            Self::UNLOCKED_CODE => TelemetryEventKind::Unlocked,
            value if (Self::KEY_ACTIVATED_BASE..Self::KEY_ACTIVATED_END).contains(&value) => {
                u8::try_from(value - Self::KEY_ACTIVATED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), |raw| {
                        TelemetryEventKind::KeyActivated(KeyIndex::new(raw))
                    })
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Resolved window average and the trigger transition it caused.
    Window(WindowTelemetry),
    /// Trigger edge details.
    Trigger(TriggerTelemetry),
    /// Combination cursor details.
    Sequence(SequenceTelemetry),
    /// Unlock output hold.
    Unlock { hold: Duration },
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WindowTelemetry {
    pub average: FrequencySample,
    pub transition: TriggerTransition,
}

/// Trigger edge payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TriggerTelemetry {
    /// Time spent armed when the edge was recorded, if an episode was running.
    pub armed_for: Option<Duration>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SequenceTelemetry {
    pub key: KeyIndex,
    pub position: u8,
    pub sequence_len: u8,
}

impl SequenceTelemetry {
    #[must_use]
    pub fn new(key: KeyIndex, position: usize, sequence_len: usize) -> Self {
        Self {
            key,
            position: truncate_count(position),
            sequence_len: truncate_count(sequence_len),
        }
    }
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<I>
where
    I: Copy,
{
    pub id: EventId,
    pub timestamp: I,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<I, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<I>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
///
/// Besides the history, the recorder counts records that have not yet been
/// handed to a reporter so a log drain can forward each record once.
pub struct TelemetryRecorder<I, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    I: Copy,
{
    ring: TelemetryRing<I, CAPACITY>,
    next_event_id: EventId,
    unreported: usize,
}

impl<I, const CAPACITY: usize> TelemetryRecorder<I, CAPACITY>
where
    I: Timestamp,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
            unreported: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<I>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<I>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of records written since the last [`take_unreported`](Self::take_unreported).
    ///
    /// Records overwritten before they were reported are not counted.
    pub fn unreported(&self) -> usize {
        self.unreported.min(self.ring.len())
    }

    /// Yields records not yet handed out, oldest first, and marks them reported.
    pub fn take_unreported(&mut self) -> impl Iterator<Item = &TelemetryRecord<I>> {
        let pending = self.unreported();
        self.unreported = 0;
        let skip = self.ring.len() - pending;
        self.ring.oldest_ordered().skip(skip)
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: I,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.unreported = self.unreported.saturating_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    /// Records a window resolution, plus the arm or disarm edge it produced.
    pub fn record_resolution(
        &mut self,
        average: FrequencySample,
        transition: TriggerTransition,
        armed_for: Option<Duration>,
        timestamp: I,
    ) -> EventId {
        let id = self.record(
            TelemetryEventKind::WindowResolved,
            TelemetryPayload::Window(WindowTelemetry {
                average,
                transition,
            }),
            timestamp,
        );

        match transition {
            TriggerTransition::Armed => {
                self.record(
                    TelemetryEventKind::TriggerArmed,
                    TelemetryPayload::none(),
                    timestamp,
                );
            }
            TriggerTransition::Disarmed => {
                self.record(
                    TelemetryEventKind::TriggerDisarmed,
                    TelemetryPayload::Trigger(TriggerTelemetry { armed_for }),
                    timestamp,
                );
            }
            TriggerTransition::StillArmed
            | TriggerTransition::StillIdle
            | TriggerTransition::DeadBand => {}
        }

        id
    }

    /// Records the rising edge of the debounced trigger output.
    pub fn record_trigger_asserted(
        &mut self,
        armed_for: Option<Duration>,
        timestamp: I,
    ) -> EventId {
        self.record(
            TelemetryEventKind::TriggerAsserted,
            TelemetryPayload::Trigger(TriggerTelemetry { armed_for }),
            timestamp,
        )
    }
}

impl<I, const CAPACITY: usize> Default for TelemetryRecorder<I, CAPACITY>
where
    I: Timestamp,
{
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_count(count: usize) -> u8 {
    u8::try_from(count).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn event_codes_decode_to_their_kind() {
        let fixtures = [
            (TelemetryEventKind::WindowResolved, 0x0001),
            (TelemetryEventKind::TriggerArmed, 0x0002),
            (TelemetryEventKind::TriggerAsserted, 0x0003),
            (TelemetryEventKind::TriggerDisarmed, 0x0004),
            (TelemetryEventKind::SequenceAdvanced, 0x0008),
            (TelemetryEventKind::SequenceReset, 0x0009),
            (TelemetryEventKind::Unlocked, 0x000A),
            (TelemetryEventKind::KeyActivated(KeyIndex::new(3)), 0x0013),
        ];

        for (kind, code) in fixtures {
            assert_eq!(kind.to_raw(), code);
            assert_eq!(TelemetryEventKind::from_raw(code), kind);
        }
        assert_eq!(
            TelemetryEventKind::from_raw(0x0042),
            TelemetryEventKind::Custom(0x0042)
        );
    }

    #[test]
    fn display_labels_are_kebab_case() {
        let mut label = heapless::String::<32>::new();
        fmt::write(
            &mut label,
            format_args!("{}", TelemetryEventKind::KeyActivated(KeyIndex::new(2))),
        )
        .unwrap();
        assert_eq!(label.as_str(), "key-activated key2");
    }

    #[test]
    fn resolution_records_arm_edge() {
        let mut recorder: TelemetryRecorder<MockInstant, 8> = TelemetryRecorder::new();
        recorder.record_resolution(
            FrequencySample::from_hz(8_700),
            TriggerTransition::Armed,
            None,
            MockInstant(40),
        );

        let kinds: heapless::Vec<TelemetryEventKind, 8> =
            recorder.oldest_first().map(|record| record.event).collect();
        assert_eq!(
            kinds.as_slice(),
            &[
                TelemetryEventKind::WindowResolved,
                TelemetryEventKind::TriggerArmed
            ]
        );
        assert_eq!(recorder.latest().map(|record| record.id), Some(1));
    }

    #[test]
    fn dead_band_records_only_the_window() {
        let mut recorder: TelemetryRecorder<MockInstant, 8> = TelemetryRecorder::new();
        recorder.record_resolution(
            FrequencySample::from_hz(8_950),
            TriggerTransition::DeadBand,
            None,
            MockInstant(0),
        );
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn take_unreported_yields_each_record_once() {
        let mut recorder: TelemetryRecorder<MockInstant, 4> = TelemetryRecorder::new();
        recorder.record(TelemetryEventKind::Unlocked, TelemetryPayload::none(), MockInstant(1));
        recorder.record(
            TelemetryEventKind::SequenceReset,
            TelemetryPayload::none(),
            MockInstant(2),
        );
        assert_eq!(recorder.take_unreported().count(), 2);
        assert_eq!(recorder.take_unreported().count(), 0);

        recorder.record(
            TelemetryEventKind::WindowResolved,
            TelemetryPayload::none(),
            MockInstant(3),
        );
        let ids: heapless::Vec<EventId, 4> = recorder.take_unreported().map(|r| r.id).collect();
        assert_eq!(ids.as_slice(), &[2]);
    }

    #[test]
    fn overwritten_records_are_not_reported_twice() {
        let mut recorder: TelemetryRecorder<MockInstant, 2> = TelemetryRecorder::new();
        for at in 0..5 {
            recorder.record(
                TelemetryEventKind::WindowResolved,
                TelemetryPayload::none(),
                MockInstant(at),
            );
        }
        assert_eq!(recorder.unreported(), 2);
        let ids: heapless::Vec<EventId, 2> = recorder.take_unreported().map(|r| r.id).collect();
        assert_eq!(ids.as_slice(), &[3, 4]);
    }
}
