mod session;

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;

use charger_core::config::ChargerConfig;
use session::{Session, TranscriptLogger};

const USAGE: &str = "Usage: charger-emulator [--transcript <path>] [--script <path>]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    transcript: Option<PathBuf>,
    script: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let transcript = match &options.transcript {
        Some(path) => TranscriptLogger::create(path)?,
        None => TranscriptLogger::disabled(),
    };
    let mut session = Session::new(ChargerConfig::new(), transcript);

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    match &options.script {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            run_script(&mut session, reader, &mut writer)
        }
        None => run_interactive(&mut session, &mut writer),
    }
}

fn run_interactive(session: &mut Session, writer: &mut impl Write) -> io::Result<()> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Charger Controller Emulator ready. Type `help` for commands or `exit` to quit."
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

/// Replays commands from a file; `#` starts a comment line.
fn run_script(
    session: &mut Session,
    reader: impl BufRead,
    writer: &mut impl Write,
) -> io::Result<()> {
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
    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options(args: impl IntoIterator<Item = String>) -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        let slot = match flag.as_str() {
            "--transcript" => &mut options.transcript,
            "--script" => &mut options.script,
            other => return Err(format!("Unknown argument `{other}`")),
        };

        let value = match inline {
            Some(value) => value,
            None => args
                .next()
                .ok_or_else(|| format!("Expected value after {flag}"))?,
        };
        *slot = Some(PathBuf::from(value));
    }

    Ok(options)
}
