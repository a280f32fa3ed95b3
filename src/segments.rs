/*!
 * Segment merging.
 *
 * Consecutive cues are concatenated into prose segments. A segment is closed
 * as soon as the characters collected reach the target length, so the target
 * is a floor rather than a ceiling: one long cue still closes its own segment.
 */

use log::debug;

use crate::errors::SubtitleError;
use crate::subtitle_processor::Cue;

/// A merged run of consecutive cues with one display timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Start time of the first cue, `HH:MM:SS`
    pub start_time: String,

    /// Current text, possibly proofread or edited
    pub text: String,

    /// Current title, if one has been assigned
    pub title: Option<String>,

    /// Text as produced by the merger
    pub original_text: String,

    /// Last title produced by the pipeline, restored by `reset`
    pub original_title: String,
}

impl Segment {
    pub fn new(start_time: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            start_time: start_time.into(),
            original_text: text.clone(),
            text,
            title: None,
            original_title: String::new(),
        }
    }

    /// Title shown before enrichment, 1-based
    pub fn placeholder_title(index: usize) -> String {
        format!("Segment {}", index + 1)
    }

    /// Give the segment its pipeline-assigned title
    pub fn assign_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        self.original_title = title.clone();
        self.title = Some(title);
    }

    /// Replace the working text, keeping the merged text as the original
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Drop any edits and restore the pipeline output
    pub fn reset(&mut self) {
        self.text = self.original_text.clone();
        self.title = if self.original_title.is_empty() {
            None
        } else {
            Some(self.original_title.clone())
        };
    }

    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

/// Merge cues into segments of at least `target_length` characters
pub fn merge(cues: &[Cue], target_length: usize) -> Result<Vec<Segment>, SubtitleError> {
    if target_length == 0 {
        return Err(SubtitleError::InvalidTargetLength);
    }

    let mut segments = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_len = 0;
    let mut start_time = String::new();

    for cue in cues {
        if buffer.is_empty() {
            start_time = cue.start.to_hms();
        }
        buffer.push(&cue.text);
        buffer_len += cue.char_len();

        if buffer_len >= target_length {
            segments.push(Segment::new(std::mem::take(&mut start_time), buffer.join(" ")));
            buffer.clear();
            buffer_len = 0;
        }
    }

    if !buffer.is_empty() {
        segments.push(Segment::new(start_time, buffer.join(" ")));
    }

    debug!("Merged {} cues into {} segments (target {} chars)", cues.len(), segments.len(), target_length);
    Ok(segments)
}
