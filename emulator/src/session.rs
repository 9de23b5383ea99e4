use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use capsense_core::console::catalog;
use capsense_core::console::{Command, StatusSnapshot, parse};
use capsense_core::controller::{Clock, Controller, PassReport};
use capsense_core::detector::{DEFAULT_DETECTOR_CONFIG, TriggerTransition};
use capsense_core::keypad::DEFAULT_KEYPAD_CONFIG;
use capsense_core::telemetry::{TelemetryPayload, TelemetryRecord};
use capsense_core::timing::Timestamp;

use crate::rig::{SimInstant, SimRig};

/// Upper bound for a single `run` command.
pub const MAX_RUN_PASSES: u32 = 100_000;
/// Upper bound for a single `advance` command.
pub const MAX_ADVANCE: Duration = Duration::from_secs(600);

/// Reasons a console line could not be executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// The line did not parse; carries the rendered parser message.
    Syntax(String),
    /// `run 0`.
    NoPasses,
    TooManyPasses { requested: u32 },
    AdvanceTooLong { requested: Duration },
    /// The rig clock cannot represent the requested deadline.
    ClockOverflow,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Syntax(message) => write!(f, "syntax {message}"),
            CommandError::NoPasses => f.write_str("run needs at least one pass"),
            CommandError::TooManyPasses { requested } => {
                write!(f, "run {requested} exceeds the {MAX_RUN_PASSES} pass limit")
            }
            CommandError::AdvanceTooLong { requested } => write!(
                f,
                "advance {}ms exceeds the {}s limit",
                requested.as_millis(),
                MAX_ADVANCE.as_secs()
            ),
            CommandError::ClockOverflow => f.write_str("virtual clock overflow"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Controller plus simulated rig, driven one console line at a time.
pub struct Session {
    controller: Controller<SimInstant>,
    rig: SimRig,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    /// Creates a session, optionally mirroring every line into `transcript`.
    pub fn new(transcript: Option<&Path>) -> io::Result<Self> {
        let controller = Controller::try_new(DEFAULT_DETECTOR_CONFIG, DEFAULT_KEYPAD_CONFIG)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
        let transcript = transcript.map(TranscriptLogger::new).transpose()?;

        Ok(Self {
            controller,
            rig: SimRig::new(),
            transcript,
        })
    }

    #[must_use]
    pub fn rig(&self) -> &SimRig {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut SimRig {
        &mut self.rig
    }

    #[must_use]
    pub fn now(&self) -> SimInstant {
        self.rig.now()
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        self.controller.status(self.rig.now())
    }

    /// Executes one console line and returns the response lines.
    ///
    /// Failures are rendered as `ERR` lines; only transcript I/O errors escape.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let requested_at = self.rig.now();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(requested_at, TranscriptRole::Host, trimmed)?;
        }

        let lines = match self.execute(trimmed) {
            Ok(lines) => lines,
            Err(err) => vec![format!("ERR {err}")],
        };
        self.record_output(&lines)?;
        Ok(lines)
    }

    /// Executes one console line without touching the transcript.
    pub fn execute(&mut self, line: &str) -> Result<Vec<String>, CommandError> {
        let command = parse(line).map_err(|err| CommandError::Syntax(err.to_string()))?;

        match command {
            Command::Freq(hz) => {
                self.rig.set_frequency(hz);
                Ok(vec![format!("OK freq {hz}Hz")])
            }
            Command::Touch(keys) => {
                let count = keys.len();
                self.rig.queue_touches(keys);
                Ok(vec![format!(
                    "OK queued {count} touches pending={}",
                    self.rig.pending_touches()
                )])
            }
            Command::Run(passes) => self.run(passes),
            Command::Advance(duration) => self.advance(duration),
            Command::Status => Ok(vec![format!("OK {}", self.status())]),
            Command::Help(topic) => Ok(catalog::help_lines(topic)),
        }
    }

    fn run(&mut self, passes: u32) -> Result<Vec<String>, CommandError> {
        if passes == 0 {
            return Err(CommandError::NoPasses);
        }
        if passes > MAX_RUN_PASSES {
            return Err(CommandError::TooManyPasses { requested: passes });
        }

        let unlocks_before = self.rig.unlock_count();
        let mut lines = Vec::new();
        for _ in 0..passes {
            self.step(&mut lines);
        }
        lines.push(self.summary(passes, unlocks_before));
        Ok(lines)
    }

    fn advance(&mut self, duration: Duration) -> Result<Vec<String>, CommandError> {
        if duration > MAX_ADVANCE {
            return Err(CommandError::AdvanceTooLong {
                requested: duration,
            });
        }
        let deadline = self
            .rig
            .now()
            .checked_add(duration)
            .ok_or(CommandError::ClockOverflow)?;

        let unlocks_before = self.rig.unlock_count();
        let mut lines = Vec::new();
        let mut passes = 0;
        while self.rig.now() < deadline {
            self.step(&mut lines);
            passes += 1;
        }
        lines.push(self.summary(passes, unlocks_before));
        Ok(lines)
    }

    /// Runs a single pass and appends its event lines.
    pub fn step(&mut self, lines: &mut Vec<String>) -> PassReport<SimInstant> {
        let report = self.controller.poll(&mut self.rig);
        lines.extend(
            self.controller
                .telemetry_mut()
                .take_unreported()
                .filter_map(describe_event),
        );
        report
    }

    fn summary(&self, passes: u32, unlocks_before: u32) -> String {
        let unlocks = self.rig.unlock_count() - unlocks_before;
        let mut line = format!(
            "OK ran {passes} passes t=+{}ms trigger={}",
            self.rig.now().as_millis(),
            if self.rig.trigger() { "high" } else { "low" }
        );
        if unlocks > 0 {
            line.push_str(&format!(" unlocks={unlocks}"));
        }
        line
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let now = self.rig.now();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(now, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(())
    }
}

/// Renders a telemetry record, skipping window resolutions that changed nothing.
fn describe_event(record: &TelemetryRecord<SimInstant>) -> Option<String> {
    let detail = match record.details {
        TelemetryPayload::Window(window) => {
            if matches!(
                window.transition,
                TriggerTransition::StillArmed
                    | TriggerTransition::StillIdle
                    | TriggerTransition::DeadBand
            ) {
                return None;
            }
            format!(" avg={}Hz", window.average.hz())
        }
        TelemetryPayload::Trigger(trigger) => trigger
            .armed_for
            .map(|armed_for| format!(" armed={}ms", armed_for.as_millis()))
            .unwrap_or_default(),
        TelemetryPayload::Sequence(sequence) => {
            format!(" seq={}/{}", sequence.position, sequence.sequence_len)
        }
        TelemetryPayload::Unlock { hold } => format!(" hold={}ms", hold.as_millis()),
        TelemetryPayload::None => String::new(),
    };

    Some(format!(
        "EVT +{}ms {}{detail}",
        record.timestamp.as_millis(),
        record.event
    ))
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Capsense emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since power-on"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, at: SimInstant, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            at.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy, Debug)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
