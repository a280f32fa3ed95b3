/*!
 * Fallback values used when enrichment of a segment cannot complete.
 *
 * Fallbacks are deterministic: a failed title becomes the segment's
 * placeholder title and a failed proofread keeps the merged text.
 */

use crate::app_config::FailurePolicy;
use crate::errors::EnrichmentError;
use crate::segments::Segment;

/// How the orchestrator continues after a failed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Use the fallback for this item only
    DegradeItem,
    /// Use fallbacks for this item and the rest of the stage
    AbortStage,
    /// Stop the run as cancelled
    Cancel,
}

/// Decide how to recover from an enrichment error under a policy
pub fn recovery_for(error: &EnrichmentError, policy: FailurePolicy) -> Recovery {
    match error {
        EnrichmentError::Cancelled => Recovery::Cancel,
        e if e.is_stage_fatal() => Recovery::AbortStage,
        _ => match policy {
            FailurePolicy::Degrade => Recovery::DegradeItem,
            FailurePolicy::AbortStage => Recovery::AbortStage,
        },
    }
}

pub fn fallback_title(index: usize) -> String {
    Segment::placeholder_title(index)
}

pub fn fallback_proofread(segment: &Segment) -> String {
    segment.original_text.clone()
}
