/*!
 * Events emitted by a run.
 *
 * The worker is the only producer and the presentation side the only
 * consumer. Events are sent in pipeline order over an unbounded channel and
 * drained by the consumer at its own pace.
 */

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::segments::Segment;

/// A pipeline stage that reports its start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    ReadFile,
    ParseSubtitles,
    MergeSegments,
    GenerateTitles,
    Proofread,
    Format,
}

impl PipelineStep {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ReadFile => "Reading subtitle file",
            Self::ParseSubtitles => "Parsing subtitles",
            Self::MergeSegments => "Merging segments",
            Self::GenerateTitles => "Generating titles",
            Self::Proofread => "Proofreading",
            Self::Format => "Formatting output",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Progress, log and result notifications from a run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StepStarted {
        step: PipelineStep,
    },
    StepProgress {
        step: PipelineStep,
        /// 1-based
        current: usize,
        total: usize,
    },
    SegmentTitled {
        index: usize,
        title: String,
    },
    SegmentProofread {
        index: usize,
        text: String,
    },
    SegmentsReady {
        segments: Vec<Segment>,
    },
    LogMessage {
        text: String,
    },
    Completed {
        segments: Vec<Segment>,
        output_path: PathBuf,
        elapsed: Duration,
    },
    Cancelled,
    Failed {
        message: String,
        /// Full error chain
        detail: String,
    },
}

impl PipelineEvent {
    /// Whether this event ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Cancelled | Self::Failed { .. })
    }
}

/// Producer half of a run's event channel
///
/// Sending never blocks. A dropped receiver is not an error for the worker,
/// the run keeps going and the event is discarded.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

pub type EventReceiver = mpsc::UnboundedReceiver<PipelineEvent>;

impl EventSender {
    pub fn send(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn log(&self, text: impl Into<String>) {
        self.send(PipelineEvent::LogMessage { text: text.into() });
    }
}

/// Create a run's event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}
