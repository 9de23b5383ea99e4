//! Real-time mode: raw key presses drive the rig while the loop keeps pace
//! with the wall clock.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use capsense_core::keypad::KeyIndex;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::rig::{CLEAR_HZ, METAL_HZ};
use crate::session::Session;

const INPUT_POLL: Duration = Duration::from_millis(10);

/// Restores cooked mode when dropped, including on early return.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LiveInput {
    Touch(KeyIndex),
    ToggleMetal,
    Quit,
}

fn map_key(key: KeyEvent) -> Option<LiveInput> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char(c @ '1'..='4') => c
            .to_digit(10)
            .and_then(|digit| u8::try_from(digit - 1).ok())
            .map(|raw| LiveInput::Touch(KeyIndex::new(raw))),
        KeyCode::Char('m' | 'M') => Some(LiveInput::ToggleMetal),
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Some(LiveInput::Quit),
        _ => None,
    }
}

pub fn run(session: &mut Session) -> io::Result<()> {
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let _guard = RawModeGuard::enable()?;

    write!(
        writer,
        "Live mode: 1-4 touch a pad, m toggles metal, q quits.\r\n"
    )?;
    writer.flush()?;

    let started = Instant::now();
    let origin = session.now().as_millis();
    let mut lines = Vec::new();

    loop {
        let input = if event::poll(INPUT_POLL)? {
            match event::read()? {
                Event::Key(key) => map_key(key),
                _ => None,
            }
        } else {
            None
        };

        match input {
            Some(LiveInput::Touch(pad)) => session.rig_mut().queue_touches([pad]),
            Some(LiveInput::ToggleMetal) => {
                let next = if session.rig().frequency() == METAL_HZ {
                    CLEAR_HZ
                } else {
                    METAL_HZ
                };
                session.rig_mut().set_frequency(next);
                write!(writer, "freq {next}Hz\r\n")?;
            }
            Some(LiveInput::Quit) => break,
            None => {}
        }

        // Holds push the virtual clock ahead of the wall clock; wait them out.
        let wall = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        while session.now().as_millis().saturating_sub(origin) < wall {
            session.step(&mut lines);
        }

        for line in lines.drain(..) {
            write!(writer, "{line}\r\n")?;
        }
        writer.flush()?;
    }

    write!(writer, "{}\r\n", session.status())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, KeyModifiers};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn digits_map_to_zero_based_pads() {
        assert_eq!(
            map_key(press(KeyCode::Char('1'))),
            Some(LiveInput::Touch(KeyIndex::new(0)))
        );
        assert_eq!(
            map_key(press(KeyCode::Char('4'))),
            Some(LiveInput::Touch(KeyIndex::new(3)))
        );
        assert_eq!(map_key(press(KeyCode::Char('5'))), None);
    }

    #[test]
    fn releases_are_ignored() {
        let mut key = press(KeyCode::Char('m'));
        assert_eq!(map_key(key), Some(LiveInput::ToggleMetal));
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(key), None);
    }
}
