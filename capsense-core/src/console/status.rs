//! Shared status surface for the console and heartbeat logs.
//!
//! The controller produces a [`StatusSnapshot`] and both front-ends render it
//! through the same `Display` implementation so the emulator output and the
//! firmware heartbeat read the same.

use core::fmt;
use core::time::Duration;

/// Point-in-time view of both state machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Last resolved average in hertz, if any window has resolved.
    pub average_hz: Option<u32>,
    pub window_count: u8,
    pub window_size: u8,
    pub armed: bool,
    /// Time since the current armed episode began.
    pub armed_for: Option<Duration>,
    /// Debounced trigger output level.
    pub trigger: bool,
    pub position: usize,
    pub sequence_len: usize,
}

impl StatusSnapshot {
    /// Snapshot of a freshly booted controller.
    #[must_use]
    pub const fn idle(window_size: u8, sequence_len: usize) -> Self {
        Self {
            average_hz: None,
            window_count: 0,
            window_size,
            armed: false,
            armed_for: None,
            trigger: false,
            position: 0,
            sequence_len,
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("detector avg=")?;
        match self.average_hz {
            Some(hz) => write!(f, "{hz}Hz")?,
            None => f.write_str("n/a")?,
        }
        write!(f, " window={}/{}", self.window_count, self.window_size)?;
        f.write_str(" armed=")?;
        if self.armed {
            write_duration(f, self.armed_for)?;
        } else {
            f.write_str("no")?;
        }
        f.write_str(" trigger=")?;
        f.write_str(if self.trigger { "high" } else { "low" })?;
        write!(f, " | keypad seq={}/{}", self.position, self.sequence_len)
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
            let seconds = millis / 1_000;
            let tenths = (millis % 1_000) / 100;
            write!(writer, "+{seconds}.{tenths}s")
        }
        Some(value) => write!(writer, "+{}ms", value.as_millis()),
    }
}
