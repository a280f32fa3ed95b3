/*!
 * # srtnotes - show notes from subtitle files
 *
 * A Rust library that turns SRT subtitles into titled, proofread show notes.
 *
 * ## Features
 *
 * - Tolerant SRT parsing that skips malformed records
 * - Merging of short cues into readable segments of a target length
 * - Segment titles and proofreading through any OpenAI-compatible API
 * - Rate-limit aware retries with a configurable budget
 * - Cancellable background runs reporting ordered progress events
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: SRT parsing and timestamp conversion
 * - `segments`: Merging cues into segments
 * - `enrichment`: Title generation and proofreading with retry and fallbacks
 * - `pipeline`: Background run orchestration, events and cancellation
 * - `formatting`: Rendering of the show-notes document
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `providers`: Client implementations for text services:
 *   - `providers::openai`: OpenAI-compatible chat completions client
 *   - `providers::mock`: Scripted provider for tests
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod enrichment;
pub mod errors;
pub mod file_utils;
pub mod formatting;
pub mod pipeline;
pub mod providers;
pub mod segments;
pub mod subtitle_processor;

// Re-export main types for easier usage
pub use app_config::Config;
pub use enrichment::{EnrichmentClient, RetryPolicy};
pub use formatting::format_show_notes;
pub use pipeline::{CancellationToken, PipelineEvent, PipelineStep, RunOrchestrator, RunOutcome};
pub use segments::{merge, Segment};
pub use subtitle_processor::{parse, Cue, Timestamp};
