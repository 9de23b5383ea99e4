mod live;
mod rig;
mod session;

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;

use session::Session;

const USAGE: &str = "Usage: capsense-emulator [--script <file>] [--transcript <file>] [--live]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    script: Option<PathBuf>,
    transcript: Option<PathBuf>,
    live: bool,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let mut session = Session::new(options.transcript.as_deref())?;

    if options.live {
        return live::run(&mut session);
    }

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    if let Some(path) = options.script {
        let reader = BufReader::new(File::open(path)?);
        return run_script(&mut session, reader, &mut writer);
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Capsense emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

/// Replays a script, echoing each command. `#` starts a comment line.
fn run_script<R, W>(session: &mut Session, reader: R, writer: &mut W) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if should_terminate(trimmed) {
            break;
        }

        writeln!(writer, "> {trimmed}")?;
        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }
    writer.flush()
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options<I>(args: I) -> Result<Options, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--script=") {
            options.script = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--script" {
            let value = args.next().ok_or("Expected value after --script")?;
            options.script = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args.next().ok_or("Expected value after --transcript")?;
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--live" {
            options.live = true;
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }

    if options.live && options.script.is_some() {
        return Err("--live and --script cannot be combined".to_string());
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_both_flag_forms() {
        let options =
            parse_options(args(&["--script", "demo.txt", "--transcript=out.log"])).unwrap();
        assert_eq!(options.script, Some(PathBuf::from("demo.txt")));
        assert_eq!(options.transcript, Some(PathBuf::from("out.log")));
        assert!(!options.live);
    }

    #[test]
    fn rejects_unknown_and_conflicting_flags() {
        assert!(parse_options(args(&["--profile"])).is_err());
        assert!(parse_options(args(&["--script"])).is_err());
        assert!(parse_options(args(&["--live", "--script", "a.txt"])).is_err());
    }

    #[test]
    fn script_echoes_commands_and_skips_comments() {
        let mut session = Session::new(None).unwrap();
        let script = "# unlock demo\ntouch 0 1 2 3 0\nrun 5\nexit\nstatus\n";
        let mut output = Vec::new();
        run_script(&mut session, script.as_bytes(), &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("> touch 0 1 2 3 0\nOK queued 5 touches"));
        assert!(output.contains("unlocks=1"));
        assert!(!output.contains("> status"));
    }
}
