/*!
 * Integration tests for run orchestration: event order, cancellation and failure handling
 */

use anyhow::Result;
use std::sync::Arc;

use srtnotes::app_config::FailurePolicy;
use srtnotes::pipeline::{
    event_channel, CancellationToken, PipelineEvent, PipelineStep, RunOrchestrator, RunOutcome, RunStage,
};
use srtnotes::providers::mock::MockProvider;
use crate::common;

fn started_steps(events: &[PipelineEvent]) -> Vec<PipelineStep> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StepStarted { step } => Some(*step),
            _ => None,
        })
        .collect()
}

fn titled(events: &[PipelineEvent]) -> Vec<(usize, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::SegmentTitled { index, title } => Some((*index, title.clone())),
            _ => None,
        })
        .collect()
}

fn proofread(events: &[PipelineEvent]) -> Vec<(usize, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::SegmentProofread { index, text } => Some((*index, text.clone())),
            _ => None,
        })
        .collect()
}

fn position(events: &[PipelineEvent], predicate: impl Fn(&PipelineEvent) -> bool) -> Option<usize> {
    events.iter().position(predicate)
}

/// Test the full stage order and per-segment ordering
#[tokio::test]
async fn test_run_withBothStages_shouldEmitEventsInPipelineOrder() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let provider = MockProvider::working();
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(
        common::one_segment_per_cue(temp_dir.path()),
        Some(common::mock_client(&provider)),
        CancellationToken::new(),
        events,
    );
    let outcome = orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    assert_eq!(
        started_steps(&events),
        vec![
            PipelineStep::ReadFile,
            PipelineStep::ParseSubtitles,
            PipelineStep::MergeSegments,
            PipelineStep::GenerateTitles,
            PipelineStep::Proofread,
            PipelineStep::Format,
        ]
    );

    let titles = titled(&events);
    assert_eq!(titles.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(titles[0].1, "Title: This is a te");

    let texts = proofread(&events);
    assert_eq!(texts.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(texts[1].1, "[proofread] It contains multiple entries.");

    // Every title precedes every proofread segment
    let last_title = events.iter().rposition(|e| matches!(e, PipelineEvent::SegmentTitled { .. })).unwrap();
    let first_proofread = position(&events, |e| matches!(e, PipelineEvent::SegmentProofread { .. })).unwrap();
    assert!(last_title < first_proofread);

    // Placeholders are announced before enrichment starts
    let ready = position(&events, |e| matches!(e, PipelineEvent::SegmentsReady { .. })).unwrap();
    assert!(ready < position(&events, |e| matches!(e, PipelineEvent::StepStarted { step: PipelineStep::GenerateTitles })).unwrap());
    if let PipelineEvent::SegmentsReady { segments } = &events[ready] {
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2].title.as_deref(), Some("Segment 3"));
    }

    // Exactly one terminal event, and it is the last one
    assert_eq!(common::terminal_count(&events), 1);
    assert!(matches!(events.last(), Some(PipelineEvent::Completed { .. })));
    assert_eq!(orchestrator.state().stage, RunStage::Completed);
    assert_eq!(orchestrator.state().history, events);

    let RunOutcome::Completed { segments, output_path, document, .. } = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(segments.len(), 3);
    assert_eq!(std::fs::read_to_string(&output_path)?, document);
    assert!(output_path.file_name().unwrap().to_string_lossy().starts_with("shownotes_"));
    assert!(document.starts_with("00:00:01 Title: This is a te\n[proofread] This is a test subtitle."));
    assert!(document.contains("\n\n00:01:10 Title: For testing"));
    Ok(())
}

/// Test that progress counts up to the number of segments for each stage
#[tokio::test]
async fn test_run_shouldReportMonotonicProgress() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(
        common::one_segment_per_cue(temp_dir.path()),
        Some(common::mock_client(&MockProvider::working())),
        CancellationToken::new(),
        events,
    );
    orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    for stage in [PipelineStep::GenerateTitles, PipelineStep::Proofread] {
        let progress: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StepProgress { step, current, total } if *step == stage => Some((*current, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    }
    Ok(())
}

/// Test that disabled stages leave placeholders and merged text
#[tokio::test]
async fn test_run_withEnrichmentDisabled_shouldUsePlaceholders() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let mut settings = common::one_segment_per_cue(temp_dir.path());
    settings.enable_titles = false;
    settings.enable_proofread = false;
    settings.target_length = 500;
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(settings, None, CancellationToken::new(), events);
    let outcome = orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    assert!(!started_steps(&events).contains(&PipelineStep::GenerateTitles));
    assert!(!started_steps(&events).contains(&PipelineStep::Proofread));

    let RunOutcome::Completed { document, .. } = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(
        document,
        "00:00:01 Segment 1\nThis is a test subtitle. It contains multiple entries. For testing purposes."
    );
    Ok(())
}

/// Test cancellation before the run starts
#[tokio::test]
async fn test_run_cancelledBeforeStart_shouldEmitOnlyCancelled() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let provider = MockProvider::working();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(
        common::one_segment_per_cue(temp_dir.path()),
        Some(common::mock_client(&provider)),
        cancel,
        events,
    );
    let outcome = orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(events, vec![PipelineEvent::Cancelled]);
    assert_eq!(provider.request_count(), 0);
    assert!(std::fs::read_dir(temp_dir.path())?.count() == 1, "no output should be written");
    Ok(())
}

/// Test cancellation in the middle of the titling stage
#[tokio::test]
async fn test_run_cancelledMidStage_shouldStopBeforeNextStage() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let cancel = CancellationToken::new();
    let hook_cancel = cancel.clone();
    // Cancel while the second title is being generated
    let provider = MockProvider::working().with_hook(Arc::new(move |call: usize| {
        if call == 1 {
            hook_cancel.cancel();
        }
    }));
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(
        common::one_segment_per_cue(temp_dir.path()),
        Some(common::mock_client(&provider)),
        cancel,
        events,
    );
    let outcome = orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(titled(&events).len(), 2);
    assert!(!started_steps(&events).contains(&PipelineStep::Proofread));
    assert!(!started_steps(&events).contains(&PipelineStep::Format));
    assert_eq!(common::terminal_count(&events), 1);
    assert_eq!(events.last(), Some(&PipelineEvent::Cancelled));
    assert_eq!(orchestrator.state().stage, RunStage::Cancelled);
    Ok(())
}

/// Test that a missing API key fails the enrichment stages but not the run
#[tokio::test]
async fn test_run_withoutCredentials_shouldFallBackAndComplete() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let provider = MockProvider::working().without_credentials();
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(
        common::one_segment_per_cue(temp_dir.path()),
        Some(common::mock_client(&provider)),
        CancellationToken::new(),
        events,
    );
    let outcome = orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    assert_eq!(provider.request_count(), 0);
    assert_eq!(
        titled(&events),
        vec![(0, "Segment 1".to_string()), (1, "Segment 2".to_string()), (2, "Segment 3".to_string())]
    );
    assert_eq!(proofread(&events)[0].1, "This is a test subtitle.");

    let skipped_logs = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::LogMessage { text } if text.contains("skipped")))
        .count();
    assert_eq!(skipped_logs, 2);
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    Ok(())
}

/// Test per-segment degradation under the default policy
#[tokio::test]
async fn test_run_withIntermittentFailures_shouldDegradeOnlyFailedSegments() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    // Every second request fails: title 2 and proofread 1 (request 4)
    let provider = MockProvider::intermittent(2);
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(
        common::one_segment_per_cue(temp_dir.path()),
        Some(common::mock_client(&provider)),
        CancellationToken::new(),
        events,
    );
    let outcome = orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    let titles = titled(&events);
    assert_eq!(titles[0].1, "Title: This is a te");
    assert_eq!(titles[1].1, "Segment 2");
    assert_eq!(titles[2].1, "Title: For testing");

    let texts = proofread(&events);
    assert_eq!(texts[0].1, "This is a test subtitle.");
    assert_eq!(texts[1].1, "[proofread] It contains multiple entries.");

    assert_eq!(provider.request_count(), 6);
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    Ok(())
}

/// Test the abort-stage policy
#[tokio::test]
async fn test_run_withAbortStagePolicy_shouldSkipRestOfStage() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let provider = MockProvider::intermittent(1);
    let mut settings = common::one_segment_per_cue(temp_dir.path());
    settings.failure_policy = FailurePolicy::AbortStage;
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(settings, Some(common::mock_client(&provider)), CancellationToken::new(), events);
    orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    // One failed call per stage, then fallbacks
    assert_eq!(provider.request_count(), 2);
    assert_eq!(titled(&events).len(), 3);
    assert!(titled(&events).iter().enumerate().all(|(i, (_, t))| *t == format!("Segment {}", i + 1)));
    assert!(matches!(events.last(), Some(PipelineEvent::Completed { .. })));
    Ok(())
}

/// Test that a rejected key aborts the stage even under the degrade policy
#[tokio::test]
async fn test_run_withUnauthorizedService_shouldAbortEachStageOnce() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let provider = MockProvider::unauthorized();
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(
        common::one_segment_per_cue(temp_dir.path()),
        Some(common::mock_client(&provider)),
        CancellationToken::new(),
        events,
    );
    orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    assert_eq!(provider.request_count(), 2);
    assert_eq!(proofread(&events).len(), 3);
    assert!(matches!(events.last(), Some(PipelineEvent::Completed { .. })));
    Ok(())
}

/// Test that an unreadable input fails the run
#[tokio::test]
async fn test_run_withMissingFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(
        common::one_segment_per_cue(temp_dir.path()),
        None,
        CancellationToken::new(),
        events,
    );
    let outcome = orchestrator.run(&temp_dir.path().join("missing.srt")).await;
    let events = common::drain(&mut receiver);

    let RunOutcome::Failed { message } = outcome else {
        panic!("expected a failed run");
    };
    assert!(message.contains("Failed to read subtitle file"));
    assert_eq!(started_steps(&events), vec![PipelineStep::ReadFile]);
    assert_eq!(common::terminal_count(&events), 1);
    assert!(matches!(events.last(), Some(PipelineEvent::Failed { detail, .. }) if !detail.is_empty()));
    assert_eq!(orchestrator.state().stage, RunStage::Failed);
    Ok(())
}

/// Test that an invalid target length fails the merge stage
#[tokio::test]
async fn test_run_withZeroTargetLength_shouldFailDuringMerge() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let mut settings = common::one_segment_per_cue(temp_dir.path());
    settings.target_length = 0;
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(settings, None, CancellationToken::new(), events);
    let outcome = orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert_eq!(started_steps(&events).last(), Some(&PipelineStep::MergeSegments));
    assert_eq!(common::terminal_count(&events), 1);
    Ok(())
}

/// Test that malformed records are reported but do not stop the run
#[tokio::test]
async fn test_run_withMalformedRecords_shouldLogAndContinue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let content = "1\nnot a time line\n\n2\n00:00:02,000 --> 00:00:03,000\nvalid cue\n";
    let input = common::create_test_file(temp_dir.path(), "broken.srt", content)?;
    let mut settings = common::one_segment_per_cue(temp_dir.path());
    settings.enable_titles = false;
    settings.enable_proofread = false;
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(settings, None, CancellationToken::new(), events);
    let outcome = orchestrator.run(&input).await;
    let events = common::drain(&mut receiver);

    assert!(events.iter().any(|e| matches!(e, PipelineEvent::LogMessage { text } if text.contains("Malformed"))));
    let RunOutcome::Completed { document, .. } = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(document, "00:00:02 Segment 1\nvalid cue");
    Ok(())
}

/// Test an empty subtitle file
#[tokio::test]
async fn test_run_withEmptyFile_shouldWriteEmptyDocument() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "empty.srt", "")?;
    let provider = MockProvider::working();
    let (events, mut receiver) = event_channel();

    let mut orchestrator = RunOrchestrator::new(
        common::one_segment_per_cue(temp_dir.path()),
        Some(common::mock_client(&provider)),
        CancellationToken::new(),
        events,
    );
    let outcome = orchestrator.run(&input).await;
    drop(common::drain(&mut receiver));

    let RunOutcome::Completed { segments, document, output_path, .. } = outcome else {
        panic!("expected a completed run");
    };
    assert!(segments.is_empty());
    assert_eq!(document, "");
    assert!(output_path.exists());
    assert_eq!(provider.request_count(), 0);
    Ok(())
}

/// Test a spawned run reports through its handle
#[tokio::test]
async fn test_spawn_shouldDeliverEventsAndOutcome() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;

    let mut handle = RunOrchestrator::spawn(
        common::one_segment_per_cue(temp_dir.path()),
        Some(common::mock_client(&MockProvider::working())),
        input,
    );

    let mut received = Vec::new();
    while let Some(event) = handle.events.recv().await {
        let terminal = event.is_terminal();
        received.push(event);
        if terminal {
            break;
        }
    }

    assert_eq!(received.first(), Some(&PipelineEvent::StepStarted { step: PipelineStep::ReadFile }));
    assert!(matches!(received.last(), Some(PipelineEvent::Completed { .. })));
    assert!(matches!(handle.join().await?, RunOutcome::Completed { .. }));
    Ok(())
}
