/*!
 * Background execution of the show-notes pipeline.
 *
 * - `cancel`: shared cancellation flag
 * - `events`: ordered progress, log and result notifications
 * - `orchestrator`: the stage machine that drives a run
 */

pub mod cancel;
pub mod events;
pub mod orchestrator;

pub use cancel::CancellationToken;
pub use events::{event_channel, EventReceiver, EventSender, PipelineEvent, PipelineStep};
pub use orchestrator::{RunHandle, RunOrchestrator, RunOutcome, RunSettings, RunStage, RunState};
