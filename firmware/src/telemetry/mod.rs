#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! defmt / host console hooks for controller telemetry.
//!
//! The controller keeps its own ring; this module only renders drained
//! records and heartbeat snapshots into single log lines.

use core::fmt::Write;

use capsense_core::console::StatusSnapshot;
use capsense_core::detector::TriggerTransition;
use capsense_core::telemetry::{TelemetryPayload, TelemetryRecord};
use heapless::String;

use crate::instant::FirmwareInstant;

/// Longest rendered telemetry or heartbeat line.
pub const LOG_LINE_CAPACITY: usize = 128;

pub type LogLine = String<LOG_LINE_CAPACITY>;

pub type FirmwareRecord = TelemetryRecord<FirmwareInstant>;

const fn transition_label(transition: TriggerTransition) -> &'static str {
    match transition {
        TriggerTransition::Armed => "armed",
        TriggerTransition::StillArmed => "still-armed",
        TriggerTransition::Disarmed => "disarmed",
        TriggerTransition::StillIdle => "idle",
        TriggerTransition::DeadBand => "dead-band",
    }
}

/// Renders one record. Lines that overflow are cut short.
pub fn format_record(record: &FirmwareRecord) -> LogLine {
    let mut line = LogLine::new();
    let _ = write!(
        line,
        "#{} {} t={}us",
        record.id,
        record.event,
        record.timestamp.as_micros()
    );

    let _ = match record.details {
        TelemetryPayload::None => Ok(()),
        TelemetryPayload::Window(window) => write!(
            line,
            " avg={}Hz {}",
            window.average.hz(),
            transition_label(window.transition)
        ),
        TelemetryPayload::Trigger(trigger) => match trigger.armed_for {
            Some(armed_for) => write!(line, " armed={}ms", armed_for.as_millis()),
            None => Ok(()),
        },
        TelemetryPayload::Sequence(sequence) => write!(
            line,
            " key={} seq={}/{}",
            sequence.key, sequence.position, sequence.sequence_len
        ),
        TelemetryPayload::Unlock { hold } => write!(line, " hold={}ms", hold.as_millis()),
    };

    line
}

pub fn log_record(record: &FirmwareRecord) {
    emit_log("telemetry", format_record(record).as_str());
}

pub fn log_heartbeat(snapshot: &StatusSnapshot) {
    let mut line = LogLine::new();
    let _ = write!(line, "{snapshot}");
    emit_log("heartbeat", line.as_str());
}

/// Reports records lost because the log channel was full.
pub fn log_dropped(count: u32) {
    let mut line = LogLine::new();
    let _ = write!(line, "dropped {count} records");
    emit_log("telemetry", line.as_str());
}

#[cfg(target_os = "none")]
fn emit_log(topic: &'static str, line: &str) {
    defmt::info!("{}: {}", topic, line);
}

#[cfg(not(target_os = "none"))]
fn emit_log(topic: &'static str, line: &str) {
    println!("{topic}: {line}");
}
