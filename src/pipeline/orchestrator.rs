/*!
 * Run orchestration.
 *
 * A run reads one subtitle file and walks it through every stage in order:
 * reading, parsing, merging, optional titling, optional proofreading and
 * formatting. Each stage reports its start, enrichment stages also report
 * per-segment progress. A run ends with exactly one of `Completed`,
 * `Cancelled` or `Failed`.
 */

use anyhow::{Context, anyhow};
use chrono::Local;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::app_config::{Config, FailurePolicy};
use crate::enrichment::{fallback_proofread, fallback_title, recovery_for, EnrichmentClient, Recovery};
use crate::errors::EnrichmentError;
use crate::file_utils::FileManager;
use crate::formatting::format_show_notes;
use crate::pipeline::cancel::CancellationToken;
use crate::pipeline::events::{event_channel, EventReceiver, EventSender, PipelineEvent, PipelineStep};
use crate::segments::{self, Segment};
use crate::subtitle_processor;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Reading,
    Parsing,
    Merging,
    Titling,
    Proofreading,
    Formatting,
    Completed,
    Cancelled,
    Failed,
}

/// The part of the configuration a run needs
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub target_length: usize,
    pub enable_titles: bool,
    pub enable_proofread: bool,
    pub failure_policy: FailurePolicy,
    pub output_directory: PathBuf,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_length: config.processing.target_length,
            enable_titles: config.processing.enable_titles,
            enable_proofread: config.processing.enable_proofread,
            failure_policy: config.processing.failure_policy,
            output_directory: config.output_directory.clone(),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Mutable state of a single run
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    pub started_at: Instant,
    pub stage: RunStage,
    pub segments: Vec<Segment>,
    /// Every event emitted so far, in order
    pub history: Vec<PipelineEvent>,
}

impl RunState {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Instant::now(),
            stage: RunStage::Idle,
            segments: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        segments: Vec<Segment>,
        output_path: PathBuf,
        document: String,
        elapsed: Duration,
    },
    Cancelled,
    Failed {
        message: String,
    },
}

/// Reason a run stops before the formatting stage finishes
enum Halt {
    Cancelled,
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for Halt {
    fn from(error: anyhow::Error) -> Self {
        Self::Failed(error)
    }
}

/// Drives one run from subtitle file to show-notes document
#[derive(Debug)]
pub struct RunOrchestrator {
    settings: RunSettings,
    client: Option<EnrichmentClient>,
    cancel: CancellationToken,
    events: EventSender,
    state: RunState,
}

impl RunOrchestrator {
    /// Create an orchestrator for one run
    ///
    /// Without a client every enabled enrichment stage falls back to
    /// placeholder titles and unmodified text.
    pub fn new(
        settings: RunSettings,
        client: Option<EnrichmentClient>,
        cancel: CancellationToken,
        events: EventSender,
    ) -> Self {
        let client = client.map(|c| c.with_event_sender(events.clone()));
        Self {
            settings,
            client,
            cancel,
            events,
            state: RunState::new(),
        }
    }

    /// Create an orchestrator talking to the configured service
    pub fn from_config(config: &Config, cancel: CancellationToken, events: EventSender) -> Self {
        let client = config
            .processing
            .needs_remote()
            .then(|| EnrichmentClient::from_config(config));
        Self::new(RunSettings::from_config(config), client, cancel, events)
    }

    /// Run in a background task
    pub fn spawn(settings: RunSettings, client: Option<EnrichmentClient>, input: PathBuf) -> RunHandle {
        let (events, receiver) = event_channel();
        let cancel = CancellationToken::new();
        let mut orchestrator = Self::new(settings, client, cancel.clone(), events);

        let join = tokio::spawn(async move { orchestrator.run(&input).await });

        RunHandle {
            events: receiver,
            cancel,
            join,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the whole pipeline for one input file
    pub async fn run(&mut self, input: &Path) -> RunOutcome {
        info!("Run {} started for {}", self.state.run_id, input.display());

        match self.execute(input).await {
            Ok(outcome) => {
                info!("Run {} completed in {:.1?}", self.state.run_id, self.state.elapsed());
                outcome
            }
            Err(Halt::Cancelled) => {
                warn!("Run {} cancelled during {:?}", self.state.run_id, self.state.stage);
                self.state.stage = RunStage::Cancelled;
                self.emit(PipelineEvent::Cancelled);
                RunOutcome::Cancelled
            }
            Err(Halt::Failed(e)) => {
                error!("Run {} failed during {:?}: {:#}", self.state.run_id, self.state.stage, e);
                self.state.stage = RunStage::Failed;
                let message = e.to_string();
                self.emit(PipelineEvent::Failed {
                    message: message.clone(),
                    detail: format!("{:?}", e),
                });
                RunOutcome::Failed { message }
            }
        }
    }

    async fn execute(&mut self, input: &Path) -> Result<RunOutcome, Halt> {
        if self.state.stage != RunStage::Idle {
            return Err(Halt::Failed(anyhow!("An orchestrator runs only once")));
        }

        self.checkpoint()?;
        self.enter(RunStage::Reading, PipelineStep::ReadFile);
        let lines = FileManager::read_lines(input)
            .with_context(|| format!("Failed to read subtitle file: {}", input.display()))?;

        self.checkpoint()?;
        self.enter(RunStage::Parsing, PipelineStep::ParseSubtitles);
        let report = subtitle_processor::parse_report(&lines);
        for skipped in &report.skipped {
            self.log(format!("Skipped {}", skipped));
        }
        self.log(format!("Parsed {} cues", report.cues.len()));

        self.checkpoint()?;
        self.enter(RunStage::Merging, PipelineStep::MergeSegments);
        let mut merged = segments::merge(&report.cues, self.settings.target_length)
            .context("Failed to merge subtitles into segments")?;
        for (index, segment) in merged.iter_mut().enumerate() {
            segment.assign_title(Segment::placeholder_title(index));
        }
        self.log(format!("Merged into {} segments", merged.len()));
        self.state.segments = merged;
        self.emit(PipelineEvent::SegmentsReady {
            segments: self.state.segments.clone(),
        });

        if self.settings.enable_titles {
            self.checkpoint()?;
            self.title_stage().await?;
        }

        if self.settings.enable_proofread {
            self.checkpoint()?;
            self.proofread_stage().await?;
        }

        self.checkpoint()?;
        self.enter(RunStage::Formatting, PipelineStep::Format);
        let document = format_show_notes(&self.state.segments, None);
        let output_path = FileManager::next_available_path(FileManager::generate_output_path(
            &self.settings.output_directory,
            Local::now(),
        ));
        FileManager::write_to_file(&output_path, &document)
            .with_context(|| format!("Failed to write show notes: {}", output_path.display()))?;
        self.log(format!("Show notes written to {}", output_path.display()));

        let elapsed = self.state.elapsed();
        self.state.stage = RunStage::Completed;
        self.emit(PipelineEvent::Completed {
            segments: self.state.segments.clone(),
            output_path: output_path.clone(),
            elapsed,
        });

        Ok(RunOutcome::Completed {
            segments: self.state.segments.clone(),
            output_path,
            document,
            elapsed,
        })
    }

    async fn title_stage(&mut self) -> Result<(), Halt> {
        self.enter(RunStage::Titling, PipelineStep::GenerateTitles);
        let total = self.state.segments.len();
        let mut aborted = self.stage_readiness(PipelineStep::GenerateTitles);

        for index in 0..total {
            self.checkpoint()?;
            let text = self.state.segments[index].text.clone();

            let result = match (&aborted, &self.client) {
                (None, Some(client)) => Some(client.generate_title(&text, &self.cancel).await),
                _ => None,
            };

            let title = match result {
                Some(Ok(title)) => title,
                Some(Err(e)) => {
                    self.recover(PipelineStep::GenerateTitles, index, &e, &mut aborted)?;
                    fallback_title(index)
                }
                None => fallback_title(index),
            };

            self.state.segments[index].assign_title(title.clone());
            self.emit(PipelineEvent::SegmentTitled { index, title });
            self.progress(PipelineStep::GenerateTitles, index + 1, total);
        }

        Ok(())
    }

    async fn proofread_stage(&mut self) -> Result<(), Halt> {
        self.enter(RunStage::Proofreading, PipelineStep::Proofread);
        let total = self.state.segments.len();
        let mut aborted = self.stage_readiness(PipelineStep::Proofread);

        for index in 0..total {
            self.checkpoint()?;
            let original = self.state.segments[index].original_text.clone();

            let result = match (&aborted, &self.client) {
                (None, Some(client)) => Some(client.proofread(&original, &self.cancel).await),
                _ => None,
            };

            let text = match result {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    self.recover(PipelineStep::Proofread, index, &e, &mut aborted)?;
                    fallback_proofread(&self.state.segments[index])
                }
                None => fallback_proofread(&self.state.segments[index]),
            };

            self.state.segments[index].set_text(text.clone());
            self.emit(PipelineEvent::SegmentProofread { index, text });
            self.progress(PipelineStep::Proofread, index + 1, total);
        }

        Ok(())
    }

    /// Why the stage cannot call the service at all, if it cannot
    fn stage_readiness(&mut self, step: PipelineStep) -> Option<String> {
        let reason = match &self.client {
            None => Some("no text service configured".to_string()),
            Some(client) => client.ensure_ready().err().map(|e| e.to_string()),
        };

        if let Some(reason) = &reason {
            warn!("{} skipped: {}", step, reason);
            self.log(format!("{} skipped, using fallbacks: {}", step, reason));
        }
        reason
    }

    /// Apply the failure policy to a failed segment
    fn recover(
        &mut self,
        step: PipelineStep,
        index: usize,
        error: &EnrichmentError,
        aborted: &mut Option<String>,
    ) -> Result<(), Halt> {
        match recovery_for(error, self.settings.failure_policy) {
            Recovery::Cancel => Err(Halt::Cancelled),
            Recovery::DegradeItem => {
                warn!("{} failed for segment {}: {}", step, index + 1, error);
                self.log(format!("{} failed for segment {}, using fallback: {}", step, index + 1, error));
                Ok(())
            }
            Recovery::AbortStage => {
                warn!("{} aborted at segment {}: {}", step, index + 1, error);
                self.log(format!(
                    "{} aborted at segment {}, using fallbacks for the rest: {}",
                    step,
                    index + 1,
                    error
                ));
                *aborted = Some(error.to_string());
                Ok(())
            }
        }
    }

    fn checkpoint(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    fn enter(&mut self, stage: RunStage, step: PipelineStep) {
        debug!("Run {} entering {:?}", self.state.run_id, stage);
        self.state.stage = stage;
        self.emit(PipelineEvent::StepStarted { step });
    }

    fn progress(&mut self, step: PipelineStep, current: usize, total: usize) {
        self.emit(PipelineEvent::StepProgress { step, current, total });
    }

    fn log(&mut self, text: String) {
        self.emit(PipelineEvent::LogMessage { text });
    }

    fn emit(&mut self, event: PipelineEvent) {
        self.state.history.push(event.clone());
        self.events.send(event);
    }
}

/// A run executing in a background task
#[derive(Debug)]
pub struct RunHandle {
    /// Events in emission order, the last one is terminal
    pub events: EventReceiver,
    cancel: CancellationToken,
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Ask the run to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to end
    pub async fn join(self) -> anyhow::Result<RunOutcome> {
        self.join.await.context("Run task panicked")
    }
}
