#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The control task publishes after every pass and the heartbeat reads the
//! atomics back into a `StatusSnapshot` without sharing the controller.

use capsense_core::console::StatusSnapshot;
use capsense_core::timing::Timestamp;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

use crate::instant::FirmwareInstant;

/// Last resolved average in hertz (0 == none yet).
static AVERAGE_HZ: AtomicU32 = AtomicU32::new(0);
static WINDOW_COUNT: AtomicU8 = AtomicU8::new(0);
/// Window capacity of the publishing controller (0 == unpublished).
static WINDOW_SIZE_SLOTS: AtomicU8 = AtomicU8::new(0);
/// Timestamp (µs, +1) at which the detector armed (0 == idle).
static ARMED_AT_MICROS: AtomicU64 = AtomicU64::new(0);
static TRIGGER: AtomicBool = AtomicBool::new(false);
static POSITION: AtomicU8 = AtomicU8::new(0);
/// Combination length of the publishing controller (0 == unpublished).
static SEQUENCE_LEN: AtomicU8 = AtomicU8::new(0);

fn encode_micros(micros: u64) -> u64 {
    micros.saturating_add(1)
}

fn decode_micros(raw: u64) -> Option<u64> {
    raw.checked_sub(1)
}

/// Stores the controller state observed at `now`.
pub fn publish(now: FirmwareInstant, snapshot: &StatusSnapshot) {
    AVERAGE_HZ.store(snapshot.average_hz.unwrap_or(0), Ordering::Relaxed);
    WINDOW_COUNT.store(snapshot.window_count, Ordering::Relaxed);
    WINDOW_SIZE_SLOTS.store(snapshot.window_size, Ordering::Relaxed);
    TRIGGER.store(snapshot.trigger, Ordering::Relaxed);
    POSITION.store(
        u8::try_from(snapshot.position).unwrap_or(u8::MAX),
        Ordering::Relaxed,
    );
    SEQUENCE_LEN.store(
        u8::try_from(snapshot.sequence_len).unwrap_or(u8::MAX),
        Ordering::Relaxed,
    );

    let armed_at = match (snapshot.armed, snapshot.armed_for) {
        (true, Some(armed_for)) => {
            let armed_for = u64::try_from(armed_for.as_micros()).unwrap_or(u64::MAX);
            encode_micros(now.as_micros().saturating_sub(armed_for))
        }
        (true, None) => encode_micros(now.as_micros()),
        (false, _) => 0,
    };
    ARMED_AT_MICROS.store(armed_at, Ordering::Relaxed);
}

/// Rebuilds a snapshot relative to `now`.
pub fn snapshot(now: FirmwareInstant) -> StatusSnapshot {
    let average = AVERAGE_HZ.load(Ordering::Relaxed);
    let armed_at = decode_micros(ARMED_AT_MICROS.load(Ordering::Relaxed));
    let armed_for = armed_at.map(|micros| {
        let since = FirmwareInstant::from(embassy_time::Instant::from_micros(micros));
        now.saturating_duration_since(since)
    });

    StatusSnapshot {
        average_hz: (average != 0).then_some(average),
        window_count: WINDOW_COUNT.load(Ordering::Relaxed),
        window_size: WINDOW_SIZE_SLOTS.load(Ordering::Relaxed),
        armed: armed_at.is_some(),
        armed_for,
        trigger: TRIGGER.load(Ordering::Relaxed),
        position: usize::from(POSITION.load(Ordering::Relaxed)),
        sequence_len: usize::from(SEQUENCE_LEN.load(Ordering::Relaxed)),
    }
}
