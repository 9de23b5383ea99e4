//! Console command catalog shared by the parser and help output.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Freq,
    Touch,
    Run,
    Advance,
    Status,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub usage: &'static str,
    pub summary: &'static str,
}

const COMMANDS: [CommandSpec; 6] = [
    CommandSpec {
        name: "freq",
        tag: CommandTag::Freq,
        usage: "freq <hz>",
        summary: "set the simulated oscillator frequency",
    },
    CommandSpec {
        name: "touch",
        tag: CommandTag::Touch,
        usage: "touch <key> [<key> ...]",
        summary: "queue pad touches, one per pass",
    },
    CommandSpec {
        name: "run",
        tag: CommandTag::Run,
        usage: "run <passes>",
        summary: "run the control loop for a number of passes",
    },
    CommandSpec {
        name: "advance",
        tag: CommandTag::Advance,
        usage: "advance <duration>",
        summary: "run the control loop until the clock moved by the duration",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        usage: "status",
        summary: "display detector and keypad state",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        usage: "help [topic]",
        summary: "show help for a command",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

/// Help text for one topic, or the full listing when `topic` is `None`.
#[cfg(feature = "alloc")]
#[must_use]
pub fn help_lines(topic: Option<&str>) -> alloc::vec::Vec<alloc::string::String> {
    use alloc::format;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    match topic {
        Some(name) => match find(name) {
            Some(spec) => alloc::vec![format!("{:<24}- {}", spec.usage, spec.summary)],
            None => {
                let topics: Vec<&str> = COMMANDS.iter().map(|spec| spec.name).collect();
                alloc::vec![
                    format!("No help available for `{name}`."),
                    format!("Available topics: {}", topics.join(", ")),
                ]
            }
        },
        None => {
            let mut lines = Vec::with_capacity(COMMANDS.len() + 2);
            lines.push("Available commands:".to_string());
            for spec in &COMMANDS {
                lines.push(format!("  {:<24}- {}", spec.usage, spec.summary));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
            lines
        }
    }
}
