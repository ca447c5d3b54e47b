//! Run lifecycle coordination around an apply.
//!
//! Before `tfmigrate apply` takes the state lock, every run that could hold
//! it is cleared:
//!
//! 1. list the workspace's runs and drop terminal ones;
//! 2. warn about post-confirmation runs (or abort, per policy) and leave
//!    them alone;
//! 3. discard discardable runs, otherwise cancel cancelable ones.
//!
//! After a successful apply, exactly one refresh-only, plan-only run is
//! queued so recorded state is reconciled without changing infrastructure.

use statemigrate_core::PostConfirmationPolicy;

use crate::client::{ApiTransport, CloudClient, Method};
use crate::error::CloudError;
use crate::runs::{extract_run_statuses, RunAction, RunStatus};
use crate::schema::CreateRunRequest;

/// What [`RunCoordinator::clear_blocking_runs`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearedRuns {
    pub discarded: Vec<String>,
    pub canceled: Vec<String>,
    /// Post-confirmation runs that were found and left untouched.
    pub post_confirmation: Vec<String>,
}

impl ClearedRuns {
    pub fn is_empty(&self) -> bool {
        self.discarded.is_empty() && self.canceled.is_empty() && self.post_confirmation.is_empty()
    }
}

pub struct RunCoordinator<'a, T> {
    client: &'a CloudClient<T>,
    policy: PostConfirmationPolicy,
}

impl<'a, T: ApiTransport> RunCoordinator<'a, T> {
    pub fn new(client: &'a CloudClient<T>, policy: PostConfirmationPolicy) -> Self {
        Self { client, policy }
    }

    /// Non-terminal runs on the workspace, in response order.
    pub fn list_runs(&self, workspace_id: &str) -> Result<Vec<RunStatus>, CloudError> {
        let path = format!("/workspaces/{workspace_id}/runs");
        let body = self.client.execute("listRuns", Method::Get, &path, None)?;
        extract_run_statuses(&body)
    }

    /// Abandon an unconfirmed plan.
    pub fn discard_run(&self, run_id: &str) -> Result<(), CloudError> {
        let path = format!("/runs/{run_id}/actions/discard");
        self.client.execute("discardRun", Method::Post, &path, None)?;
        Ok(())
    }

    /// Interrupt a run that is planning or applying.
    pub fn cancel_run(&self, run_id: &str) -> Result<(), CloudError> {
        let path = format!("/runs/{run_id}/actions/cancel");
        self.client.execute("cancelRun", Method::Post, &path, None)?;
        Ok(())
    }

    /// Clear every run that would block the state lock. The first failing
    /// request aborts; runs already handled stay handled.
    pub fn clear_blocking_runs(&self, workspace_id: &str) -> Result<ClearedRuns, CloudError> {
        let runs = self.list_runs(workspace_id)?;
        let mut cleared = ClearedRuns::default();

        for run in runs.iter().filter(|r| r.is_post_confirmation) {
            tracing::warn!(
                workspace_id,
                run_id = %run.run_id,
                status = %run.status,
                "unfinished run is past confirmation; it will not be discarded or canceled"
            );
            if self.policy == PostConfirmationPolicy::Abort {
                return Err(CloudError::PostConfirmationRun {
                    run_id: run.run_id.clone(),
                    status: run.status.clone(),
                });
            }
            cleared.post_confirmation.push(run.run_id.clone());
        }

        for run in &runs {
            match run.corrective_action() {
                Some(RunAction::Discard) => {
                    self.discard_run(&run.run_id)?;
                    tracing::info!(workspace_id, run_id = %run.run_id, "discarded run");
                    cleared.discarded.push(run.run_id.clone());
                }
                Some(RunAction::Cancel) => {
                    self.cancel_run(&run.run_id)?;
                    tracing::info!(workspace_id, run_id = %run.run_id, "canceled run");
                    cleared.canceled.push(run.run_id.clone());
                }
                None => {}
            }
        }

        Ok(cleared)
    }

    /// Queue one refresh-only, plan-only run on the workspace.
    pub fn trigger_refresh_run(&self, workspace_id: &str) -> Result<(), CloudError> {
        const OP: &str = "createPlanOnlyRefreshRun";
        let payload = serde_json::to_string(&CreateRunRequest::refresh_only_plan(workspace_id))
            .map_err(|source| CloudError::Parse { operation: OP, source })?;
        self.client.execute(OP, Method::Post, "/runs", Some(&payload))?;
        tracing::info!(workspace_id, "queued refresh-only plan");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingTransport;

    const RUNS_PATH: &str = "/workspaces/ws-1/runs";

    fn runs_body(runs: &[(&str, &str, bool, bool)]) -> String {
        let items: Vec<String> = runs
            .iter()
            .map(|(id, status, c, d)| {
                format!(
                    r#"{{"id":"{id}","attributes":{{"status":"{status}","actions":{{"is-cancelable":{c},"is-discardable":{d}}}}}}}"#
                )
            })
            .collect();
        format!(r#"{{"data":[{}]}}"#, items.join(","))
    }

    fn coordinator<'a>(
        client: &'a CloudClient<&'a RecordingTransport>,
        policy: PostConfirmationPolicy,
    ) -> RunCoordinator<'a, &'a RecordingTransport> {
        RunCoordinator::new(client, policy)
    }

    #[test]
    fn discards_discardable_and_cancels_cancelable() {
        let transport = RecordingTransport::new()
            .respond(
                RUNS_PATH,
                &runs_body(&[
                    ("run-a", "planned", false, true),
                    ("run-b", "planning", true, false),
                    ("run-c", "applied", true, true),
                    ("run-d", "pending", false, false),
                ]),
            )
            .respond_post("/runs/run-a/actions/discard", "")
            .respond_post("/runs/run-b/actions/cancel", "");
        let client = CloudClient::new(&transport, "acme");

        let cleared = coordinator(&client, PostConfirmationPolicy::Warn)
            .clear_blocking_runs("ws-1")
            .unwrap();

        assert_eq!(cleared.discarded, vec!["run-a"]);
        assert_eq!(cleared.canceled, vec!["run-b"]);
        assert!(cleared.post_confirmation.is_empty());
        assert_eq!(
            transport.paths(Method::Post),
            vec!["/runs/run-a/actions/discard", "/runs/run-b/actions/cancel"]
        );
    }

    #[test]
    fn post_confirmation_runs_are_left_alone_under_warn() {
        let transport = RecordingTransport::new()
            .respond(
                RUNS_PATH,
                &runs_body(&[
                    ("run-x", "applying", true, true),
                    ("run-y", "planned", false, true),
                ]),
            )
            .respond_post("/runs/run-y/actions/discard", "");
        let client = CloudClient::new(&transport, "acme");

        let cleared = coordinator(&client, PostConfirmationPolicy::Warn)
            .clear_blocking_runs("ws-1")
            .unwrap();

        assert_eq!(cleared.post_confirmation, vec!["run-x"]);
        assert_eq!(cleared.discarded, vec!["run-y"]);
        assert_eq!(transport.paths(Method::Post), vec!["/runs/run-y/actions/discard"]);
    }

    #[test]
    fn abort_policy_fails_before_touching_any_run() {
        let transport = RecordingTransport::new().respond(
            RUNS_PATH,
            &runs_body(&[
                ("run-y", "planned", false, true),
                ("run-x", "apply_queued", true, false),
            ]),
        );
        let client = CloudClient::new(&transport, "acme");

        let err = coordinator(&client, PostConfirmationPolicy::Abort)
            .clear_blocking_runs("ws-1")
            .unwrap_err();

        assert!(
            matches!(&err, CloudError::PostConfirmationRun { run_id, status }
                if run_id == "run-x" && status == "apply_queued"),
            "got: {err}"
        );
        assert!(transport.paths(Method::Post).is_empty());
    }

    #[test]
    fn failed_discard_aborts_remaining_work() {
        let transport = RecordingTransport::new()
            .respond(
                RUNS_PATH,
                &runs_body(&[
                    ("run-a", "planned", false, true),
                    ("run-b", "planned", false, true),
                ]),
            )
            .fail(Method::Post, "/runs/run-a/actions/discard", 409);
        let client = CloudClient::new(&transport, "acme");

        let err = coordinator(&client, PostConfirmationPolicy::Warn)
            .clear_blocking_runs("ws-1")
            .unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert!(err.to_string().contains("discardRun"));
        assert_eq!(transport.paths(Method::Post), vec!["/runs/run-a/actions/discard"]);
    }

    #[test]
    fn failed_listing_is_surfaced() {
        let transport = RecordingTransport::new().fail(Method::Get, RUNS_PATH, 500);
        let client = CloudClient::new(&transport, "acme");

        let err = coordinator(&client, PostConfirmationPolicy::Warn)
            .clear_blocking_runs("ws-1")
            .unwrap_err();
        assert!(err.to_string().contains("listRuns"), "{err}");
    }

    #[test]
    fn no_runs_means_no_actions() {
        let transport = RecordingTransport::new().respond(RUNS_PATH, r#"{"data":[]}"#);
        let client = CloudClient::new(&transport, "acme");

        let cleared = coordinator(&client, PostConfirmationPolicy::Warn)
            .clear_blocking_runs("ws-1")
            .unwrap();
        assert!(cleared.is_empty());
        assert_eq!(transport.calls().len(), 1);
    }

    #[test]
    fn refresh_run_posts_refresh_only_plan_only_payload() {
        let transport = RecordingTransport::new().respond_post("/runs", r#"{"data":{"id":"run-new"}}"#);
        let client = CloudClient::new(&transport, "acme");

        coordinator(&client, PostConfirmationPolicy::Warn)
            .trigger_refresh_run("ws-1")
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, "createPlanOnlyRefreshRun");
        let body: serde_json::Value =
            serde_json::from_str(calls[0].body.as_deref().expect("body")).unwrap();
        assert_eq!(body["data"]["type"], "runs");
        assert_eq!(body["data"]["attributes"]["refresh-only"], true);
        assert_eq!(body["data"]["attributes"]["plan-only"], true);
        assert_eq!(body["data"]["relationships"]["workspace"]["data"]["id"], "ws-1");
        assert_eq!(
            body["data"]["relationships"]["workspace"]["data"]["type"],
            "workspaces"
        );
    }
}
