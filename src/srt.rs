use std::fmt::Write;
use std::time::Duration;

use thiserror::Error;

use crate::segment::{Segment, Track};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SrtError {
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),

    #[error("invalid timing line {0:?}")]
    TimingLine(String),
}

/// Renders a track in SubRip form. Numbering is 1-based and derived from
/// each segment's position; blank lines inside a segment's text are dropped
/// so they cannot terminate the block early.
pub fn to_string(track: &Track) -> String {
    let mut out = String::new();

    for segment in track.segments() {
        // writing into a String cannot fail
        let _ = writeln!(out, "{}", segment.index + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_timestamp(segment.start),
            format_timestamp(segment.end)
        );
        for line in segment.text.lines().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(out, "{}", line.trim_end());
        }
        out.push('\n');
    }

    out
}

pub fn format_timestamp(at: Duration) -> String {
    let ms = at.as_millis();
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Parses SubRip text as written by caption providers. Tolerates a BOM, CRLF
/// line endings, `.` as the millisecond separator, a missing millisecond part,
/// a missing index line and cue settings after the end timestamp.
pub fn parse(input: &str) -> Result<Vec<Segment>, SrtError> {
    let input = input.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut segments = Vec::new();

    for block in blocks(&input) {
        let Some(timing_at) = block.iter().position(|l| l.contains("-->")) else {
            continue;
        };
        let (start, end) = parse_timing_line(block[timing_at])?;
        let text = block[timing_at + 1..]
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join("\n");

        segments.push(Segment::new(segments.len(), start, end, text));
    }

    Ok(segments)
}

fn blocks(input: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in input.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn parse_timing_line(line: &str) -> Result<(Duration, Duration), SrtError> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| SrtError::TimingLine(line.to_string()))?;
    let end = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| SrtError::TimingLine(line.to_string()))?;

    Ok((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

pub fn parse_timestamp(ts: &str) -> Result<Duration, SrtError> {
    let invalid = || SrtError::Timestamp(ts.to_string());

    let (clock, fraction) = match ts.split_once([',', '.']) {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (ts, None),
    };

    let parts = clock
        .split(':')
        .map(|p| p.parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return Err(invalid()),
    };
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    let millis = match fraction {
        None => 0,
        Some(f) if f.is_empty() || !f.chars().all(|c| c.is_ascii_digit()) => {
            return Err(invalid());
        }
        Some(f) => {
            // "5" is 500ms, "05" is 50ms, digits past the third are dropped
            let digits: String = f.chars().chain("000".chars()).take(3).collect();
            digits.parse::<u64>().map_err(|_| invalid())?
        }
    };

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis))
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}
