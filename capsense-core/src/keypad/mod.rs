//! Capacitive keypad map shared by firmware and host targets.
//!
//! Four touch pads share one common send line. Each pad is mapped to a tone
//! used for audible feedback, and the unlock combination is an ordered list
//! of pad indices. Everything here is `const` data so the same tables compile
//! into the firmware image and the emulator.

use core::fmt;
use core::time::Duration;

use crate::config::ConfigError;
use crate::timing::HoldAction;

pub mod matcher;

pub use matcher::{MatchOutcome, SequenceMatcher, TargetSequence, UnlockAction};

/// Number of touch pads wired to the controller.
pub const KEY_COUNT: usize = 4;
/// Upper bound on pads a keypad table may describe.
pub const MAX_KEYS: usize = 8;
/// Charge-time samples summed into one capacitive reading.
pub const CAP_SAMPLES: u8 = 10;
/// Readings strictly above this value count as a touch.
pub const CAP_THRESHOLD: u32 = 150;
/// Time a key tone plays before the next pad is read.
pub const TONE_HOLD: Duration = Duration::from_millis(500);
/// Time the unlock output stays asserted after a completed combination.
pub const UNLOCK_HOLD: Duration = Duration::from_secs(10);

/// Identifier of one physical touch pad.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct KeyIndex(u8);

impl KeyIndex {
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Deterministic index for lookups into per-key tables.
    #[must_use]
    pub fn as_index(self) -> usize {
        usize::from(self.0)
    }

    /// Raw pad number.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Attempts to construct a [`KeyIndex`] for one of the [`KEY_COUNT`] pads.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        if index < KEY_COUNT {
            u8::try_from(index).ok().map(Self)
        } else {
            None
        }
    }
}

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key{}", self.0)
    }
}

/// Audible feedback pitch for a pad.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyTone {
    pub name: &'static str,
    pub frequency_hz: u16,
}

impl KeyTone {
    pub const fn new(name: &'static str, frequency_hz: u16) -> Self {
        Self { name, frequency_hz }
    }

    /// Half of the square-wave period, in microseconds.
    #[must_use]
    pub fn half_period_us(&self) -> u32 {
        if self.frequency_hz == 0 {
            0
        } else {
            500_000 / u32::from(self.frequency_hz)
        }
    }
}

pub const NOTE_C4: KeyTone = KeyTone::new("C4", 262);
pub const NOTE_D4: KeyTone = KeyTone::new("D4", 294);
pub const NOTE_E4: KeyTone = KeyTone::new("E4", 330);
pub const NOTE_F4: KeyTone = KeyTone::new("F4", 349);

/// Tone assigned to each pad, indexed by [`KeyIndex::as_index`].
pub const KEY_TONES: [KeyTone; KEY_COUNT] = [NOTE_C4, NOTE_D4, NOTE_E4, NOTE_F4];

/// Ordered pads that make up the unlock combination.
pub const UNLOCK_SEQUENCE: [KeyIndex; 5] = [
    KeyIndex::new(0),
    KeyIndex::new(1),
    KeyIndex::new(2),
    KeyIndex::new(3),
    KeyIndex::new(0),
];

/// Tone to play for a pad, held for a fixed time.
pub type ToneAction = HoldAction<KeyTone>;

/// Summed charge-time measurement for one pad.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct CapacitiveReading(u32);

impl CapacitiveReading {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// Static keypad wiring, combination and feedback timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeypadConfig {
    pub tones: &'static [KeyTone],
    pub sequence: TargetSequence,
    pub threshold: u32,
    pub samples: u8,
    pub tone_hold: Duration,
    pub unlock_hold: Duration,
}

impl KeypadConfig {
    pub const fn new(
        tones: &'static [KeyTone],
        sequence: TargetSequence,
        threshold: u32,
        samples: u8,
        tone_hold: Duration,
        unlock_hold: Duration,
    ) -> Self {
        Self {
            tones,
            sequence,
            threshold,
            samples,
            tone_hold,
            unlock_hold,
        }
    }

    /// Number of pads scanned every pass.
    #[must_use]
    pub const fn key_count(&self) -> usize {
        self.tones.len()
    }

    /// Iterates pads in scan order, never more than [`MAX_KEYS`].
    pub fn keys(&self) -> impl Iterator<Item = KeyIndex> + use<> {
        let count = u8::try_from(self.key_count().min(MAX_KEYS)).unwrap_or(u8::MAX);
        (0..count).map(KeyIndex::new)
    }

    /// Tone mapped to `key`, if the pad exists.
    #[must_use]
    pub fn tone_for(&self, key: KeyIndex) -> Option<KeyTone> {
        self.tones.get(key.as_index()).copied()
    }

    /// Builds the feedback action for `key`, if the pad exists.
    #[must_use]
    pub fn tone_action(&self, key: KeyIndex) -> Option<ToneAction> {
        self.tone_for(key).map(|tone| ToneAction::new(tone, self.tone_hold))
    }

    /// Returns `true` when `reading` counts as a touch.
    #[must_use]
    pub const fn is_active(&self, reading: CapacitiveReading) -> bool {
        reading.value() > self.threshold
    }

    /// Checks the table for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tones.is_empty() {
            return Err(ConfigError::NoKeys);
        }
        if self.tones.len() > MAX_KEYS {
            return Err(ConfigError::TooManyKeys {
                count: self.tones.len(),
            });
        }
        if self.sequence.is_empty() {
            return Err(ConfigError::EmptySequence);
        }
        if let Some((position, key)) = self
            .sequence
            .keys()
            .iter()
            .enumerate()
            .find(|(_, key)| key.as_index() >= self.key_count())
        {
            return Err(ConfigError::KeyOutOfRange {
                position,
                key: key.raw(),
            });
        }
        Ok(())
    }
}

/// Keypad configuration used by the device.
pub const DEFAULT_KEYPAD_CONFIG: KeypadConfig = KeypadConfig::new(
    &KEY_TONES,
    TargetSequence::new(&UNLOCK_SEQUENCE),
    CAP_THRESHOLD,
    CAP_SAMPLES,
    TONE_HOLD,
    UNLOCK_HOLD,
);
