//! Run-status extraction.
//!
//! A run-listing response is reduced to the runs that still need attention:
//! terminal runs are dropped, the rest are classified as post-confirmation
//! (never touched) or as candidates for discard / cancel.

use crate::error::{parse_json, CloudError};
use crate::schema::RunListDocument;

/// Statuses of runs that are finished and hold no lock.
pub const TERMINAL_STATUSES: &[&str] = &[
    "policy_soft_failed",
    "planned_and_finished",
    "applied",
    "discarded",
    "errored",
    "canceled",
    "force_canceled",
];

/// Statuses of runs that have passed the user-approval gate.
pub const POST_CONFIRMATION_STATUSES: &[&str] = &[
    "confirmed",
    "post_plan_running",
    "post_plan_completed",
    "apply_queued",
    "applying",
];

pub fn is_terminal(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

pub fn is_post_confirmation(status: &str) -> bool {
    POST_CONFIRMATION_STATUSES.contains(&status)
}

/// A non-terminal run and what may be done with it. Fetched fresh for every
/// migration; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    pub run_id: String,
    pub status: String,
    pub is_cancelable: bool,
    pub is_discardable: bool,
    pub is_post_confirmation: bool,
}

/// The corrective action for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    /// Abandon an unconfirmed plan.
    Discard,
    /// Interrupt a run that is still executing.
    Cancel,
}

impl RunStatus {
    /// Discard wins over cancel; post-confirmation runs get no action.
    pub fn corrective_action(&self) -> Option<RunAction> {
        if self.is_post_confirmation {
            None
        } else if self.is_discardable {
            Some(RunAction::Discard)
        } else if self.is_cancelable {
            Some(RunAction::Cancel)
        } else {
            None
        }
    }
}

/// Parse a `GET /workspaces/{id}/runs` body into the non-terminal runs, in
/// response order.
pub fn extract_run_statuses(body: &str) -> Result<Vec<RunStatus>, CloudError> {
    let doc: RunListDocument = parse_json("extractRunStatuses", body)?;
    Ok(doc
        .data
        .into_iter()
        .filter(|run| !is_terminal(&run.attributes.status))
        .map(|run| {
            let status = run.attributes.status;
            RunStatus {
                is_cancelable: run.attributes.actions.is_cancelable,
                is_discardable: run.attributes.actions.is_discardable,
                is_post_confirmation: is_post_confirmation(&status),
                run_id: run.id,
                status,
            }
        })
        .collect())
}
