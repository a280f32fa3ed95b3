use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;

use crate::app_config::Config;
use crate::enrichment::EnrichmentClient;
use crate::errors::AppError;
use crate::file_utils::FileManager;
use crate::pipeline::{PipelineEvent, RunHandle, RunOrchestrator, RunOutcome, RunSettings};

// @module: Application controller for show-notes generation

/// How often the event channel is drained while a run is in progress
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Result of processing every subtitle file in a folder
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    pub completed: usize,
    pub cancelled: usize,
    pub failed: usize,
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    /// Print the document to stdout after a successful run
    print_document: bool,
}

impl Controller {
    /// Create a new controller for test purposes with default configuration
    pub fn new_for_test() -> Result<Self> {
        Self::with_config(Config::default())
    }

    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self {
            config,
            print_document: false,
        })
    }

    pub fn with_print(mut self, print_document: bool) -> Self {
        self.print_document = print_document;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration used by subsequent runs
    pub fn refresh(&mut self, config: Config) -> Result<()> {
        config.validate().context("Configuration validation failed")?;
        self.config = config;
        Ok(())
    }

    /// Process one subtitle file against the configured service
    pub async fn run(&self, input_file: PathBuf) -> Result<RunOutcome> {
        let client = self
            .config
            .processing
            .needs_remote()
            .then(|| EnrichmentClient::from_config(&self.config));
        self.run_with_client(input_file, client).await
    }

    /// Process one subtitle file with an explicit enrichment client
    pub async fn run_with_client(&self, input_file: PathBuf, client: Option<EnrichmentClient>) -> Result<RunOutcome> {
        if !FileManager::file_exists(&input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        info!("Processing: {}", input_file.display());
        let settings = RunSettings::from_config(&self.config);
        let mut handle = RunOrchestrator::spawn(settings, client, input_file);

        let cancel = handle.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current step");
                cancel.cancel();
            }
        });

        let progress_bar = Self::create_progress_bar();
        Self::drain_events(&mut handle, &progress_bar).await;
        interrupt.abort();

        let outcome = handle.join().await?;
        match &outcome {
            RunOutcome::Completed { output_path, document, elapsed, .. } => {
                progress_bar.finish_and_clear();
                info!("Success: {} ({})", output_path.display(), Self::format_duration(*elapsed));
                if self.print_document {
                    println!("{}", document);
                }
            }
            RunOutcome::Cancelled => {
                progress_bar.abandon_with_message("Cancelled");
            }
            RunOutcome::Failed { message } => {
                progress_bar.abandon_with_message(format!("Failed: {}", message));
            }
        }

        Ok(outcome)
    }

    /// Run the workflow in folder mode, processing every `.srt` file in a directory
    pub async fn run_folder(&self, input_dir: PathBuf) -> Result<FolderSummary> {
        let start_time = std::time::Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let subtitle_files = FileManager::find_files(&input_dir, "srt")?;
        if subtitle_files.is_empty() {
            return Err(anyhow!("No subtitle files found in directory: {:?}", input_dir));
        }

        info!("Found {} subtitle files in {}", subtitle_files.len(), input_dir.display());

        let mut summary = FolderSummary::default();
        for subtitle_file in subtitle_files {
            match self.run(subtitle_file.clone()).await {
                Ok(RunOutcome::Completed { .. }) => summary.completed += 1,
                Ok(RunOutcome::Cancelled) => {
                    summary.cancelled += 1;
                    // The interrupt was meant for the whole batch
                    break;
                }
                Ok(RunOutcome::Failed { message }) => {
                    error!("Error processing {}: {}", subtitle_file.display(), message);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Error processing {}: {:#}", subtitle_file.display(), e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Processed {} files in {}: {} completed, {} failed, {} cancelled",
            summary.completed + summary.failed + summary.cancelled,
            Self::format_duration(start_time.elapsed()),
            summary.completed,
            summary.failed,
            summary.cancelled
        );

        Ok(summary)
    }

    /// Verify credentials and reachability of the configured service
    pub async fn check_connection(&self) -> Result<(), AppError> {
        let client = EnrichmentClient::from_config(&self.config);
        client.ensure_ready()?;
        if let Err(e) = client.test_connection().await {
            error!("Failed to reach {}: {}", self.config.api.base_url, e);
            return Err(e.into());
        }
        info!("Connection to {} ({}) is working", self.config.api.base_url, self.config.api.model);
        Ok(())
    }

    /// Poll the run's events until the terminal one arrives
    async fn drain_events(handle: &mut RunHandle, progress_bar: &ProgressBar) {
        let mut ticker = tokio::time::interval(EVENT_POLL_INTERVAL);
        loop {
            ticker.tick().await;
            loop {
                match handle.events.try_recv() {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        Self::render_event(progress_bar, &event);
                        if terminal {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }
        }
    }

    fn render_event(progress_bar: &ProgressBar, event: &PipelineEvent) {
        match event {
            PipelineEvent::StepStarted { step } => {
                progress_bar.set_position(0);
                progress_bar.set_message(step.display_name());
                debug!("{}", step);
            }
            PipelineEvent::StepProgress { current, total, .. } => {
                progress_bar.set_length(*total as u64);
                progress_bar.set_position(*current as u64);
            }
            PipelineEvent::SegmentTitled { index, title } => {
                debug!("Segment {} titled: {}", index + 1, title);
            }
            PipelineEvent::SegmentProofread { index, text } => {
                debug!("Segment {} proofread ({} chars)", index + 1, text.chars().count());
            }
            PipelineEvent::SegmentsReady { segments } => {
                progress_bar.set_length(segments.len() as u64);
            }
            PipelineEvent::LogMessage { text } => {
                progress_bar.suspend(|| info!("{}", text));
            }
            PipelineEvent::Completed { segments, elapsed, .. } => {
                progress_bar.suspend(|| {
                    info!("Generated show notes for {} segments in {}", segments.len(), Self::format_duration(*elapsed))
                });
            }
            PipelineEvent::Cancelled => {
                progress_bar.suspend(|| warn!("Run cancelled"));
            }
            PipelineEvent::Failed { message, detail } => {
                progress_bar.suspend(|| {
                    error!("{}", message);
                    debug!("{}", detail);
                });
            }
        }
    }

    fn create_progress_bar() -> ProgressBar {
        let progress_bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.enable_steady_tick(Duration::from_millis(100));
        progress_bar
    }

    // Format duration in a human-readable format
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
