//! Ordered combination matcher over discrete key events.
//!
//! The matcher is a pure function of (cursor, key): a matching key advances
//! the cursor, anything else sends it back to zero, and reaching the end of
//! the combination emits an [`UnlockAction`] and re-arms at zero. There is no
//! partial credit: a mismatching key is not retried as the start of a new
//! attempt, even when it equals the first element of the combination.

use core::time::Duration;

use super::{KeyIndex, UNLOCK_HOLD};
use crate::timing::HoldAction;

/// Drive the unlock output high for the hold duration.
pub type UnlockAction = HoldAction<bool>;

/// Immutable unlock combination.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TargetSequence {
    keys: &'static [KeyIndex],
}

impl TargetSequence {
    pub const fn new(keys: &'static [KeyIndex]) -> Self {
        Self { keys }
    }

    /// Returns the ordered keys of the combination.
    #[must_use]
    pub const fn keys(&self) -> &'static [KeyIndex] {
        self.keys
    }

    /// Returns the number of keys in the combination.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` for an empty combination, which can never complete.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key expected at `position`, if inside the combination.
    #[must_use]
    pub fn expected(&self, position: usize) -> Option<KeyIndex> {
        self.keys.get(position).copied()
    }
}

/// Transition taken for one key event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MatchOutcome {
    /// The key matched; `position` keys are now matched in a row.
    Advanced { position: usize },
    /// The key did not match; the cursor went from `from` back to zero.
    Reset { from: usize },
    /// The final key matched; the cursor is back at zero.
    Completed(UnlockAction),
}

impl MatchOutcome {
    /// Returns the unlock action when the combination completed.
    #[must_use]
    pub const fn unlock(self) -> Option<UnlockAction> {
        match self {
            MatchOutcome::Completed(action) => Some(action),
            _ => None,
        }
    }
}

/// Cursor over a [`TargetSequence`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceMatcher {
    target: TargetSequence,
    position: usize,
    unlock_hold: Duration,
}

impl SequenceMatcher {
    /// Creates a matcher at position zero.
    #[must_use]
    pub const fn new(target: TargetSequence, unlock_hold: Duration) -> Self {
        Self {
            target,
            position: 0,
            unlock_hold,
        }
    }

    /// Creates a matcher with the default unlock hold.
    #[must_use]
    pub const fn with_target(target: TargetSequence) -> Self {
        Self::new(target, UNLOCK_HOLD)
    }

    /// Number of consecutive correct keys since the last reset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the combination being matched.
    #[must_use]
    pub const fn target(&self) -> &TargetSequence {
        &self.target
    }

    /// Applies one key event and reports the transition taken.
    pub fn advance(&mut self, key: KeyIndex) -> MatchOutcome {
        if self.target.expected(self.position) != Some(key) {
            let from = self.position;
            self.position = 0;
            return MatchOutcome::Reset { from };
        }

        self.position += 1;
        if self.position == self.target.len() {
            self.position = 0;
            MatchOutcome::Completed(UnlockAction::new(true, self.unlock_hold))
        } else {
            MatchOutcome::Advanced {
                position: self.position,
            }
        }
    }

    /// Applies one key event, returning the unlock action on completion.
    pub fn on_key_activated(&mut self, key: KeyIndex) -> Option<UnlockAction> {
        self.advance(key).unlock()
    }

    /// Returns the cursor to zero.
    pub fn reset(&mut self) {
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypad::UNLOCK_SEQUENCE;

    fn keys(raw: &[u8]) -> impl Iterator<Item = KeyIndex> + '_ {
        raw.iter().copied().map(KeyIndex::new)
    }

    fn matcher() -> SequenceMatcher {
        SequenceMatcher::with_target(TargetSequence::new(&UNLOCK_SEQUENCE))
    }

    #[test]
    fn full_combination_unlocks_once_after_last_key() {
        let mut matcher = matcher();
        let outcomes: heapless::Vec<Option<UnlockAction>, 8> =
            keys(&[0, 1, 2, 3, 0]).map(|key| matcher.on_key_activated(key)).collect();

        assert!(outcomes[..4].iter().all(Option::is_none));
        let unlock = outcomes[4].expect("fifth key completes the combination");
        assert!(unlock.value);
        assert_eq!(unlock.hold, UNLOCK_HOLD);
        assert_eq!(matcher.position(), 0);
    }

    #[test]
    fn mismatch_resets_and_never_unlocks() {
        let mut matcher = matcher();
        assert_eq!(matcher.on_key_activated(KeyIndex::new(0)), None);
        assert_eq!(matcher.on_key_activated(KeyIndex::new(1)), None);
        assert_eq!(
            matcher.advance(KeyIndex::new(9)),
            MatchOutcome::Reset { from: 2 }
        );
        assert_eq!(matcher.position(), 0);

        assert_eq!(matcher.on_key_activated(KeyIndex::new(3)), None);
        assert_eq!(matcher.on_key_activated(KeyIndex::new(0)), None);
        assert_eq!(matcher.position(), 1);
    }

    #[test]
    fn repeated_combination_unlocks_each_time() {
        let mut matcher = matcher();
        let unlocks = keys(&[0, 1, 2, 3, 0, 0, 1, 2, 3, 0])
            .filter_map(|key| matcher.on_key_activated(key))
            .count();
        assert_eq!(unlocks, 2);
    }

    #[test]
    fn first_key_matches_from_zero() {
        let mut matcher = matcher();
        assert_eq!(
            matcher.advance(KeyIndex::new(0)),
            MatchOutcome::Advanced { position: 1 }
        );
        assert_eq!(
            matcher.advance(KeyIndex::new(2)),
            MatchOutcome::Reset { from: 1 }
        );
        assert_eq!(matcher.advance(KeyIndex::new(3)), MatchOutcome::Reset { from: 0 });
    }

    #[test]
    fn overlapping_prefix_is_not_rescanned() {
        // 0,1,0 mismatches at the third key; that 0 does not count as a fresh start.
        let mut matcher = matcher();
        matcher.advance(KeyIndex::new(0));
        matcher.advance(KeyIndex::new(1));
        assert_eq!(
            matcher.advance(KeyIndex::new(0)),
            MatchOutcome::Reset { from: 2 }
        );
        assert_eq!(
            matcher.advance(KeyIndex::new(1)),
            MatchOutcome::Reset { from: 0 }
        );
    }

    #[test]
    fn empty_target_never_completes() {
        let mut matcher = SequenceMatcher::with_target(TargetSequence::new(&[]));
        for key in keys(&[0, 1, 2, 3]) {
            assert_eq!(matcher.advance(key), MatchOutcome::Reset { from: 0 });
        }
    }
}
