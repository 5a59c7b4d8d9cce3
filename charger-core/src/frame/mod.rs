//! Telemetry frame decoder for the phone link.
//!
//! The phone app sends fixed 18-byte ASCII frames:
//!
//! ```text
//! 0        8         17
//! hh:MM:ss BBBXXXNNN P
//! ```
//!
//! where `BBB` is the battery level, `XXX` the stop-charging threshold, `NNN`
//! the resume-charging threshold and `P` the plugged-in flag. When nothing
//! changed the nine payload bytes read `HEARTBEAT` instead. Layout slicing is
//! done with `winnow` combinators over the raw byte slice.
//!
//! Numeric fields are parsed leniently, like C `atoi`: leading whitespace and a
//! sign are accepted, digits are consumed up to the first non-digit, and a
//! field without digits reads as zero. A garbled field therefore never fails
//! the frame; it silently decodes as a (possibly wrong) number.

use core::fmt;

use winnow::combinator::opt;
use winnow::prelude::*;
use winnow::token::{any, one_of, take, take_while};

/// Total length of a telemetry frame.
pub const FRAME_LEN: usize = 18;
/// Length of the `hh:MM:ss` prefix.
pub const TIMESTAMP_LEN: usize = 8;
/// Length of the heartbeat / numeric payload.
pub const PAYLOAD_LEN: usize = 9;
/// Width of each numeric payload field.
pub const FIELD_LEN: usize = 3;
/// Payload marking a heartbeat frame.
pub const HEARTBEAT_PAYLOAD: &[u8; PAYLOAD_LEN] = b"HEARTBEAT";
/// Flag byte value reported while the phone sees external power.
pub const PLUGGED_IN_FLAG: u8 = b'1';

/// Errors reported by the frame decoder.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameError {
    /// The read produced a byte count other than [`FRAME_LEN`].
    ShortRead { received: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::ShortRead { received } => {
                write!(f, "short read: {received} of {FRAME_LEN} bytes")
            }
        }
    }
}

/// Opaque `hh:MM:ss` prefix echoed from the phone.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameTimestamp([u8; TIMESTAMP_LEN]);

impl FrameTimestamp {
    #[must_use]
    pub const fn new(raw: [u8; TIMESTAMP_LEN]) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TIMESTAMP_LEN] {
        &self.0
    }
}

impl fmt::Display for FrameTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write as _;

        for &byte in &self.0 {
            let ch = if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte)
            } else {
                '?'
            };
            f.write_char(ch)?;
        }
        Ok(())
    }
}

/// Battery report carried by a non-heartbeat frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusReading {
    pub battery_pct: u16,
    pub max_threshold: u16,
    pub min_threshold: u16,
    pub plugged_in: bool,
}

impl StatusReading {
    #[must_use]
    pub const fn new(
        battery_pct: u16,
        max_threshold: u16,
        min_threshold: u16,
        plugged_in: bool,
    ) -> Self {
        Self {
            battery_pct,
            max_threshold,
            min_threshold,
            plugged_in,
        }
    }
}

/// Meaning of a decoded frame payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecodedReading {
    Heartbeat,
    StatusReading(StatusReading),
}

impl DecodedReading {
    /// Returns `true` for heartbeat frames.
    #[must_use]
    pub const fn is_heartbeat(&self) -> bool {
        matches!(self, DecodedReading::Heartbeat)
    }
}

/// Full view of a frame, including the fields only used for logging.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DecodedFrame {
    pub timestamp: FrameTimestamp,
    pub reading: DecodedReading,
    pub plugged_in: bool,
}

/// Decodes a raw frame into a reading.
///
/// # Errors
///
/// Returns [`FrameError::ShortRead`] when `raw` is not exactly [`FRAME_LEN`] bytes.
pub fn decode(raw: &[u8]) -> Result<DecodedReading, FrameError> {
    decode_frame(raw).map(|frame| frame.reading)
}

/// Decodes a raw frame, keeping the timestamp and plugged-in flag.
///
/// # Errors
///
/// Returns [`FrameError::ShortRead`] when `raw` is not exactly [`FRAME_LEN`] bytes.
pub fn decode_frame(raw: &[u8]) -> Result<DecodedFrame, FrameError> {
    let short = FrameError::ShortRead {
        received: raw.len(),
    };
    if raw.len() != FRAME_LEN {
        return Err(short);
    }

    let mut input = raw;
    let (timestamp, payload, flag) = frame_layout(&mut input).map_err(|_| short)?;
    let timestamp = <[u8; TIMESTAMP_LEN]>::try_from(timestamp).map_err(|_| short)?;
    let plugged_in = flag == PLUGGED_IN_FLAG;

    Ok(DecodedFrame {
        timestamp: FrameTimestamp::new(timestamp),
        reading: payload_reading(payload, plugged_in),
        plugged_in,
    })
}

fn frame_layout<'i>(input: &mut &'i [u8]) -> winnow::Result<(&'i [u8], &'i [u8], u8)> {
    (take(TIMESTAMP_LEN), take(PAYLOAD_LEN), any).parse_next(input)
}

fn payload_reading(payload: &[u8], plugged_in: bool) -> DecodedReading {
    if payload == HEARTBEAT_PAYLOAD {
        return DecodedReading::Heartbeat;
    }

    let mut input = payload;
    let (battery_pct, max_threshold, min_threshold) =
        numeric_fields(&mut input).unwrap_or((0, 0, 0));

    DecodedReading::StatusReading(StatusReading {
        battery_pct,
        max_threshold,
        min_threshold,
        plugged_in,
    })
}

fn numeric_fields(input: &mut &[u8]) -> winnow::Result<(u16, u16, u16)> {
    (lenient_field, lenient_field, lenient_field).parse_next(input)
}

fn lenient_field(input: &mut &[u8]) -> winnow::Result<u16> {
    take(FIELD_LEN).map(lenient_u16).parse_next(input)
}

/// Parses a field the way `atoi` would, saturating negatives to zero.
fn lenient_u16(field: &[u8]) -> u16 {
    let mut input = field;
    let value = lenient_integer(&mut input).unwrap_or(0);
    u16::try_from(value.max(0)).unwrap_or(u16::MAX)
}

fn lenient_integer(input: &mut &[u8]) -> winnow::Result<i32> {
    (
        take_while(0.., is_c_space),
        opt(one_of([b'+', b'-'])),
        take_while(0.., is_digit),
    )
        .map(|(_, sign, digits)| signed_value(sign, digits))
        .parse_next(input)
}

fn signed_value(sign: Option<u8>, digits: &[u8]) -> i32 {
    let magnitude = digits.iter().fold(0i32, |acc, &digit| {
        acc.saturating_mul(10)
            .saturating_add(i32::from(digit - b'0'))
    });

    if sign == Some(b'-') {
        -magnitude
    } else {
        magnitude
    }
}

fn is_c_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

fn is_digit(byte: u8) -> bool {
    byte.is_ascii_digit()
}
