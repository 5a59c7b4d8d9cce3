use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use charger_core::charge::{ChargeDecision, ChargeState, PowerOutput};
use charger_core::config::ChargerConfig;
use charger_core::context::{ControllerContext, CycleReport, FrameDisposition, RawLinkSource};
use charger_core::filter::CurrentSensor;
use charger_core::frame::{FRAME_LEN, HEARTBEAT_PAYLOAD};
use charger_core::telemetry::{StatusEvent, StatusRecorder, StatusSink};

const MAX_TICKS_PER_COMMAND: u32 = 100_000;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("link", "link <up|down>                    - drive the link STATE signal"),
    (
        "frame",
        "frame <battery> <max> <min> [unplugged] - queue a status frame",
    ),
    (
        "heartbeat",
        "heartbeat [unplugged]             - queue a heartbeat frame",
    ),
    ("send", "send <text>                       - queue raw bytes on the link"),
    ("current", "current <mA>                      - set the raw sensor reading"),
    ("tick", "tick [count]                      - run polling cycles"),
    ("wait", "wait <ms>                         - advance time without polling"),
    ("status", "status                            - display controller state"),
    ("history", "history                           - list recorded status events"),
    ("help", "help [topic]                      - show help for a command"),
];

/// Scripted link: a STATE level plus a byte queue.
#[derive(Debug, Default)]
struct SimLink {
    up: bool,
    pending: VecDeque<u8>,
}

impl RawLinkSource for SimLink {
    fn read_frame(&mut self, buf: &mut [u8; FRAME_LEN], _timeout: Duration) -> usize {
        let count = self.pending.len().min(FRAME_LEN);
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *slot = byte;
        }
        count
    }

    fn bytes_available(&mut self) -> bool {
        !self.pending.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.pending.pop_front()
    }

    fn is_link_up(&mut self) -> bool {
        self.up
    }
}

#[derive(Debug)]
struct SimPower {
    enabled: bool,
    switches: usize,
}

impl PowerOutput for SimPower {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.switches += 1;
    }
}

#[derive(Debug, Default)]
struct SimSensor {
    raw_ma: u16,
}

impl CurrentSensor for SimSensor {
    fn read_raw_current_ma(&mut self) -> u16 {
        self.raw_ma
    }
}

/// Records every event and keeps the ones produced by the current command.
struct SessionSink {
    recorder: StatusRecorder<HostInstant>,
    fresh: Vec<StatusEvent>,
}

impl StatusSink<HostInstant> for SessionSink {
    fn emit(&mut self, event: StatusEvent, timestamp: HostInstant) {
        self.recorder.record(event, timestamp);
        self.fresh.push(event);
    }
}

pub struct Session {
    context: ControllerContext<HostInstant>,
    link: SimLink,
    power: SimPower,
    sensor: SimSensor,
    sink: SessionSink,
    transcript: TranscriptLogger,
    started_at: HostInstant,
    elapsed: Duration,
}

impl Session {
    pub fn new(config: ChargerConfig, transcript: TranscriptLogger) -> Self {
        Self {
            context: ControllerContext::new(config),
            link: SimLink::default(),
            power: SimPower {
                enabled: true,
                switches: 0,
            },
            sensor: SimSensor::default(),
            sink: SessionSink {
                recorder: StatusRecorder::new(),
                fresh: Vec::new(),
            },
            transcript,
            started_at: HostInstant::now(),
            elapsed: Duration::ZERO,
        }
    }

    fn now(&self) -> HostInstant {
        self.started_at + self.elapsed
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.transcript
            .append_line(self.elapsed, TranscriptRole::Host, trimmed)?;

        let (command, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };

        let result = match command.to_ascii_lowercase().as_str() {
            "help" => Ok(help_lines(rest)),
            "link" => self.handle_link(rest),
            "frame" => self.handle_frame(rest),
            "heartbeat" => self.handle_heartbeat(rest),
            "send" => Ok(self.queue_bytes(rest.as_bytes())),
            "current" => self.handle_current(rest),
            "tick" => self.handle_tick(rest),
            "wait" => self.handle_wait(rest),
            "status" => Ok(self.status_lines()),
            "history" => Ok(self.history_lines()),
            other => Err(format!("ERR unknown command `{other}` (try `help`)")),
        };

        let lines = match result {
            Ok(lines) => lines,
            Err(message) => vec![message],
        };
        self.record_output(&lines)?;
        Ok(lines)
    }

    fn handle_link(&mut self, rest: &str) -> Result<Vec<String>, String> {
        let up = match rest.to_ascii_lowercase().as_str() {
            "up" => true,
            "down" => false,
            _ => return Err("ERR syntax expected `link <up|down>`".to_string()),
        };
        self.link.up = up;
        Ok(vec![format!(
            "OK link signal {}",
            if up { "high" } else { "low" }
        )])
    }

    fn handle_frame(&mut self, rest: &str) -> Result<Vec<String>, String> {
        let mut fields = rest.split_whitespace();
        let mut number = |name: &str| -> Result<u16, String> {
            let field = fields
                .next()
                .ok_or_else(|| format!("ERR syntax missing <{name}>"))?;
            field
                .parse::<u16>()
                .ok()
                .filter(|value| *value <= 999)
                .ok_or_else(|| format!("ERR syntax <{name}> must be 0-999, got `{field}`"))
        };
        let battery = number("battery")?;
        let max = number("max")?;
        let min = number("min")?;
        let plugged = parse_plug_flag(fields.next())?;

        let payload = format!("{battery:03}{max:03}{min:03}");
        let frame = self.build_frame(payload.as_bytes(), plugged);
        Ok(self.queue_bytes(&frame))
    }

    fn handle_heartbeat(&mut self, rest: &str) -> Result<Vec<String>, String> {
        let plugged = parse_plug_flag(rest.split_whitespace().next())?;
        let frame = self.build_frame(HEARTBEAT_PAYLOAD, plugged);
        Ok(self.queue_bytes(&frame))
    }

    fn handle_current(&mut self, rest: &str) -> Result<Vec<String>, String> {
        let raw_ma = rest
            .parse::<u16>()
            .map_err(|_| format!("ERR syntax expected `current <mA>`, got `{rest}`"))?;
        self.sensor.raw_ma = raw_ma;
        Ok(vec![format!("OK sensor raw={raw_ma}mA")])
    }

    fn handle_tick(&mut self, rest: &str) -> Result<Vec<String>, String> {
        let count = if rest.is_empty() {
            1
        } else {
            rest.parse::<u32>()
                .ok()
                .filter(|count| (1..=MAX_TICKS_PER_COMMAND).contains(count))
                .ok_or_else(|| {
                    format!("ERR syntax tick count must be 1-{MAX_TICKS_PER_COMMAND}")
                })?
        };

        let mut lines = Vec::new();
        for _ in 0..count {
            let report = self.run_cycle();
            lines.extend(self.sink.fresh.drain(..).map(|event| format!("EVENT {event}")));
            if let Some(line) = describe_frame(&report) {
                lines.push(line);
            }
        }
        lines.push(format!("OK t={}ms", self.elapsed.as_millis()));
        Ok(lines)
    }

    fn handle_wait(&mut self, rest: &str) -> Result<Vec<String>, String> {
        let millis = rest
            .parse::<u64>()
            .map_err(|_| format!("ERR syntax expected `wait <ms>`, got `{rest}`"))?;
        self.elapsed += Duration::from_millis(millis);
        Ok(vec![format!("OK t={}ms", self.elapsed.as_millis())])
    }

    fn run_cycle(&mut self) -> CycleReport<HostInstant> {
        let now = self.now();
        let mut clock = move || now;
        let report = self.context.run_cycle(
            &mut self.link,
            &mut self.sensor,
            &mut self.power,
            &mut self.sink,
            &mut clock,
        );
        self.elapsed += self.context.config().poll_interval;
        report
    }

    fn build_frame(&self, payload: &[u8], plugged: bool) -> Vec<u8> {
        let mut frame = clock_text(self.elapsed).into_bytes();
        frame.extend_from_slice(payload);
        frame.push(if plugged { b'1' } else { b'0' });
        frame
    }

    fn queue_bytes(&mut self, bytes: &[u8]) -> Vec<String> {
        self.link.pending.extend(bytes.iter().copied());
        vec![format!(
            "OK queued {} bytes ({} pending)",
            bytes.len(),
            self.link.pending.len()
        )]
    }

    fn status_lines(&self) -> Vec<String> {
        let now = self.now();
        let charge = self.context.charge();
        let link = self.context.link();
        let filter = self.context.filter();

        let mut lines = vec![
            format!("link: {}", link.state()),
            format!(
                "charge: {} (power {})",
                charge.state(),
                if self.power.enabled { "on" } else { "off" }
            ),
            format!(
                "current: {}mA filtered ({:?}, raw {}mA)",
                filter.average(),
                filter.mode(),
                self.sensor.raw_ma
            ),
        ];
        if let Some(deadline) = charge.settle_deadline().filter(|_| charge.is_settling(now)) {
            lines.push(format!(
                "settling: {}ms remaining",
                deadline.saturating_duration_since(now).as_millis()
            ));
        }
        match link.last_liveness() {
            Some(at) => lines.push(format!(
                "last frame: {}ms ago",
                now.saturating_duration_since(at).as_millis()
            )),
            None => lines.push("last frame: never".to_string()),
        }
        lines.push(format!(
            "pending bytes: {}, power switches: {}",
            self.link.pending.len(),
            self.power.switches
        ));
        lines
    }

    fn history_lines(&self) -> Vec<String> {
        if self.sink.recorder.is_empty() {
            return vec!["no events recorded".to_string()];
        }
        self.sink
            .recorder
            .oldest_first()
            .map(|record| {
                let at = record.timestamp.saturating_duration_since(self.started_at);
                format!("#{:<4} +{:>6}ms {}", record.id, at.as_millis(), record.event)
            })
            .collect()
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(self.elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
impl Session {
    fn charge_state(&self) -> ChargeState {
        self.context.charge().state()
    }

    fn power_enabled(&self) -> bool {
        self.power.enabled
    }
}

fn parse_plug_flag(token: Option<&str>) -> Result<bool, String> {
    match token.map(str::to_ascii_lowercase).as_deref() {
        None | Some("plugged") => Ok(true),
        Some("unplugged") => Ok(false),
        Some(other) => Err(format!(
            "ERR syntax expected `plugged` or `unplugged`, got `{other}`"
        )),
    }
}

fn describe_frame(report: &CycleReport<HostInstant>) -> Option<String> {
    let line = match report.frame? {
        FrameDisposition::Heartbeat => "frame: heartbeat".to_string(),
        FrameDisposition::Reading(outcome) => {
            let decision = match outcome.decision {
                ChargeDecision::Unchanged(state) => format!("unchanged ({state})"),
                ChargeDecision::Paused => "paused".to_string(),
                ChargeDecision::Resumed { .. } => "resumed".to_string(),
                ChargeDecision::Bounced { .. } => "paused and resumed".to_string(),
                ChargeDecision::Settling { .. } => "ignored while settling".to_string(),
            };
            format!("frame: reading {decision}")
        }
        FrameDisposition::Discarded { received } => {
            format!("frame: discarded ({received} of {FRAME_LEN} bytes)")
        }
    };
    Some(line)
}

/// `hh:MM:ss` wall-clock text the phone app would stamp on a frame.
fn clock_text(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        (seconds / 3_600) % 24,
        (seconds / 60) % 60,
        seconds % 60
    )
}

fn help_lines(topic: &str) -> Vec<String> {
    if topic.is_empty() {
        return HELP_TOPICS
            .iter()
            .map(|(_, usage)| (*usage).to_string())
            .collect();
    }

    match HELP_TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
    {
        Some((_, usage)) => vec![(*usage).to_string()],
        None => {
            let topics: Vec<&str> = HELP_TOPICS.iter().map(|(name, _)| *name).collect();
            vec![format!(
                "ERR unknown help topic `{topic}` (topics: {})",
                topics.join(", ")
            )]
        }
    }
}

pub struct TranscriptLogger {
    writer: Box<dyn Write>,
}

impl TranscriptLogger {
    /// Creates a transcript file at `path`, truncating any previous run.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: Box::new(BufWriter::new(file)),
        };

        logger.write_header()?;
        Ok(logger)
    }

    /// Logger that discards everything.
    pub fn disabled() -> Self {
        Self {
            writer: Box::new(io::sink()),
        }
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Charger controller emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
