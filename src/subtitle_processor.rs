use std::fmt;
use std::path::Path;
use regex::Regex;
use once_cell::sync::Lazy;
use anyhow::Result;
use log::{debug, warn};

use crate::errors::SubtitleError;
use crate::file_utils::FileManager;

// @module: Subtitle parsing

// @const: Timestamp shape, field widths are tolerant and milliseconds optional
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+):(\d+):(\d+)(?:[,.](\d+))?$").unwrap()
});

const TIME_SEPARATOR: &str = "-->";

// @struct: Elapsed time with millisecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    // @field: Total milliseconds, used for ordering
    millis: u64,

    // @field: Hours, minutes and seconds as written, not normalized
    clock: [u64; 3],
}

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        let clock = [
            millis / 3_600_000,
            (millis % 3_600_000) / 60_000,
            (millis % 60_000) / 1_000,
        ];
        Self { millis, clock }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    /// Parse an `HH:MM:SS,mmm` timestamp
    ///
    /// Only the shape is checked. `0:5:9,000` and `00:005:09,000` are
    /// accepted, as is `.` for the millisecond separator and a missing
    /// millisecond part. Out of range fields such as `00:00:75` are kept
    /// as written.
    pub fn parse(value: &str) -> Result<Self, SubtitleError> {
        let trimmed = value.trim();
        let invalid = || SubtitleError::InvalidTimestamp(trimmed.to_string());
        let caps = TIMESTAMP_REGEX.captures(trimmed).ok_or_else(invalid)?;

        let field = |i: usize| -> Result<u64, SubtitleError> {
            caps.get(i)
                .map_or(Ok(0), |m| m.as_str().parse::<u64>())
                .map_err(|_| invalid())
        };

        let clock = [field(1)?, field(2)?, field(3)?];
        let millis = field(4)?;

        let total = clock[0].checked_mul(3_600_000)
            .and_then(|total| total.checked_add(clock[1].checked_mul(60_000)?))
            .and_then(|total| total.checked_add(clock[2].checked_mul(1_000)?))
            .and_then(|total| total.checked_add(millis))
            .ok_or_else(invalid)?;

        Ok(Self { millis: total, clock })
    }

    /// Display form used in show notes, milliseconds truncated and each
    /// field padded to two digits
    pub fn to_hms(&self) -> String {
        let [hours, minutes, seconds] = self.clock;
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{:03}", self.to_hms(), self.millis % 1_000)
    }
}

/// Convert `HH:MM:SS,mmm` to `HH:MM:SS`
pub fn convert_timestamp(value: &str) -> Result<String, SubtitleError> {
    Ok(Timestamp::parse(value)?.to_hms())
}

// @struct: Single subtitle cue
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    // @field: Index as written in the file, not renumbered
    pub index: u64,

    pub start: Timestamp,

    pub end: Timestamp,

    // @field: Text lines joined with a single space
    pub text: String,
}

impl Cue {
    pub fn new(index: u64, start: Timestamp, end: Timestamp, text: impl Into<String>) -> Self {
        Cue {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    /// Length used by the merger, in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} {} {}", self.start, TIME_SEPARATOR, self.end)?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Result of a parse, with the records that were dropped
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub cues: Vec<Cue>,
    pub skipped: Vec<SubtitleError>,
}

/// Parse subtitle lines into cues, dropping malformed blocks
pub fn parse<S: AsRef<str>>(lines: &[S]) -> Vec<Cue> {
    parse_report(lines).cues
}

/// Parse subtitle lines into cues and report what was skipped
///
/// A digit-only line opens a block. If the next line is not a usable time
/// line the index line alone is dropped and scanning resumes right after it,
/// so a stray number never swallows the block that follows.
pub fn parse_report<S: AsRef<str>>(lines: &[S]) -> ParseReport {
    let mut report = ParseReport::default();
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx].as_ref().trim();
        if !is_index_line(line) {
            idx += 1;
            continue;
        }

        let index = match line.parse::<u64>() {
            Ok(index) => index,
            Err(_) => {
                report.skip(idx, format!("index out of range: {}", line));
                idx += 1;
                continue;
            }
        };

        idx += 1;
        if idx >= lines.len() {
            break;
        }

        let (start, end) = match parse_time_line(lines[idx].as_ref()) {
            Ok(times) => times,
            Err(reason) => {
                report.skip(idx, reason);
                continue;
            }
        };
        idx += 1;

        let mut text_lines = Vec::new();
        while idx < lines.len() {
            let text_line = lines[idx].as_ref().trim();
            if text_line.is_empty() {
                break;
            }
            text_lines.push(text_line);
            idx += 1;
        }

        report.cues.push(Cue::new(index, start, end, text_lines.join(" ")));
        idx += 1;
    }

    debug!("Parsed {} cues ({} malformed records skipped)", report.cues.len(), report.skipped.len());
    report
}

/// Read a subtitle file and parse it
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<Cue>> {
    let lines = FileManager::read_lines(path)?;
    Ok(parse(&lines))
}

impl ParseReport {
    fn skip(&mut self, zero_based_line: usize, reason: String) {
        let error = SubtitleError::MalformedRecord {
            line: zero_based_line + 1,
            reason,
        };
        warn!("Skipping record: {}", error);
        self.skipped.push(error);
    }
}

fn is_index_line(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

fn parse_time_line(line: &str) -> Result<(Timestamp, Timestamp), String> {
    let trimmed = line.trim();
    let (start, end) = trimmed.split_once(TIME_SEPARATOR)
        .ok_or_else(|| format!("expected a time line, found: {}", trimmed))?;

    // Some files carry position hints after the end time
    let end = end.split_whitespace().next().unwrap_or_default();

    let start = Timestamp::parse(start).map_err(|e| e.to_string())?;
    let end = Timestamp::parse(end).map_err(|e| e.to_string())?;
    Ok((start, end))
}
