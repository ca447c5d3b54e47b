//! Workspace migration orchestrator.
//!
//! Workspaces are processed one at a time in ascending name order. Each one
//! moves through a fixed sequence of [`Stage`]s:
//!
//! ```text
//! plan:  Init → VariablesBuilt → Migrated → Done
//! apply: Init → VariablesBuilt → RunsCleared → Applied → RefreshTriggered → Done
//! ```
//!
//! The first failing workspace stops the batch; workspaces already finished
//! are left as they are. A refresh that cannot be queued fails the workspace
//! at [`Stage::Applied`]; the applied migration itself is not undone.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use statemigrate_cloud::{ApiTransport, ClearedRuns, CloudClient, RunCoordinator, VariableSetCatalog, VariableSetResolver};
use statemigrate_core::{Config, MigrationMode, Workspace, WorkspaceName};
use statemigrate_vars::{aggregate, collect_sensitive_overrides, render_tfvars, write_vars_file};

use crate::error::MigrationError;
use crate::subprocess::{CommandRunner, Invocation};

/// Progress of one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    VariablesBuilt,
    RunsCleared,
    /// Plan mode: `tfmigrate plan` succeeded.
    Migrated,
    /// Apply mode: `tfmigrate apply` succeeded.
    Applied,
    RefreshTriggered,
    Done,
}

impl Stage {
    /// Every stage a successful workspace passes through in `mode`.
    pub fn sequence(mode: MigrationMode) -> &'static [Stage] {
        match mode {
            MigrationMode::Plan => &[Stage::Init, Stage::VariablesBuilt, Stage::Migrated, Stage::Done],
            MigrationMode::Apply => &[
                Stage::Init,
                Stage::VariablesBuilt,
                Stage::RunsCleared,
                Stage::Applied,
                Stage::RefreshTriggered,
                Stage::Done,
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::VariablesBuilt => "variables-built",
            Stage::RunsCleared => "runs-cleared",
            Stage::Migrated => "migrated",
            Stage::Applied => "applied",
            Stage::RefreshTriggered => "refresh-triggered",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub workspace: WorkspaceName,
    pub mode: MigrationMode,
    /// Stages reached, in order.
    pub stages: Vec<Stage>,
    pub vars_file: Option<PathBuf>,
    /// Variables whose value is the literal string `"null"`.
    pub null_value_keys: Vec<String>,
    pub cleared_runs: ClearedRuns,
    pub refresh_triggered: bool,
}

impl MigrationReport {
    fn new(workspace: WorkspaceName, mode: MigrationMode) -> Self {
        Self {
            workspace,
            mode,
            stages: vec![Stage::Init],
            vars_file: None,
            null_value_keys: Vec::new(),
            cleared_runs: ClearedRuns::default(),
            refresh_triggered: false,
        }
    }

    /// Last stage reached.
    pub fn stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Init)
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!(workspace = %self.workspace, from = %self.stage(), to = %stage, "stage");
        self.stages.push(stage);
    }
}

/// Result of a whole job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub reports: Vec<MigrationReport>,
    /// Workspaces mapped to the `"null"` directory.
    pub skipped: Vec<WorkspaceName>,
    pub test_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Migrate,
    VariablesOnly,
}

pub struct Orchestrator<'a, T, R> {
    config: &'a Config,
    client: &'a CloudClient<T>,
    runner: R,
    /// Fetched on first use so jobs with only disabled workspaces make no calls.
    catalog: Option<VariableSetCatalog>,
}

impl<'a, T: ApiTransport, R: CommandRunner> Orchestrator<'a, T, R> {
    pub fn new(config: &'a Config, client: &'a CloudClient<T>, runner: R) -> Self {
        Self {
            config,
            client,
            runner,
            catalog: None,
        }
    }

    /// Generate variables files and run the migration for every workspace.
    pub fn migrate_all(&mut self) -> Result<JobSummary, MigrationError> {
        self.run_batch(Job::Migrate)
    }

    /// Generate variables files for every workspace without migrating.
    pub fn write_all_variables_files(&mut self) -> Result<JobSummary, MigrationError> {
        self.run_batch(Job::VariablesOnly)
    }

    fn run_batch(&mut self, job: Job) -> Result<JobSummary, MigrationError> {
        let mut summary = JobSummary {
            test_mode: self.config.is_test_mode(),
            ..JobSummary::default()
        };
        if summary.test_mode {
            tracing::warn!("API token is \"null\"; running in test mode without remote calls or variables files");
        }
        tracing::info!(mode = %self.config.mode, organization = %self.config.organization, "starting job");

        for workspace in self.config.workspaces() {
            if workspace.directory.is_disabled() {
                tracing::info!(workspace = %workspace.name, "directory is \"null\"; skipping");
                summary.skipped.push(workspace.name);
                continue;
            }
            let report = self.process_workspace(&workspace, job)?;
            summary.reports.push(report);
        }

        tracing::info!(
            processed = summary.reports.len(),
            skipped = summary.skipped.len(),
            "job finished"
        );
        Ok(summary)
    }

    fn process_workspace(&mut self, workspace: &Workspace, job: Job) -> Result<MigrationReport, MigrationError> {
        let span = tracing::info_span!("workspace", workspace = %workspace.name);
        let _entered = span.enter();

        let mut report = MigrationReport::new(workspace.name.clone(), self.config.mode);
        match self.run_stages(workspace, job, &mut report) {
            Ok(()) => {
                tracing::info!(directory = %workspace.directory, "workspace done");
                Ok(report)
            }
            Err(source) => {
                tracing::error!(stage = %report.stage(), error = %source, "workspace failed");
                Err(MigrationError::Workspace {
                    workspace: workspace.name.clone(),
                    stage: report.stage(),
                    source: Box::new(source),
                })
            }
        }
    }

    fn run_stages(&mut self, workspace: &Workspace, job: Job, report: &mut MigrationReport) -> Result<(), MigrationError> {
        let dir = workspace.directory.resolve(&self.config.workspace_root);
        let workspace_id = if self.config.is_test_mode() {
            None
        } else {
            Some(self.client.workspace_id(&workspace.name)?)
        };

        let env = self.build_variables(workspace, workspace_id.as_deref(), &dir, report)?;
        report.advance(Stage::VariablesBuilt);

        if job == Job::VariablesOnly {
            report.advance(Stage::Done);
            return Ok(());
        }

        self.prepare_terraform(&dir, &env)?;

        let mode = self.config.mode;
        let coordinator = RunCoordinator::new(self.client, self.config.post_confirmation_policy);

        if mode.is_apply() {
            if let Some(id) = workspace_id.as_deref() {
                report.cleared_runs = coordinator.clear_blocking_runs(id)?;
            }
            report.advance(Stage::RunsCleared);
        }

        self.runner.run(&self.tfmigrate(mode, &dir, &env))?;
        report.advance(if mode.is_apply() { Stage::Applied } else { Stage::Migrated });

        if mode.is_apply() {
            if let Some(id) = workspace_id.as_deref() {
                coordinator.trigger_refresh_run(id)?;
                report.refresh_triggered = true;
                report.advance(Stage::RefreshTriggered);
            }
        }

        report.advance(Stage::Done);
        Ok(())
    }

    /// Write the workspace's variables file and return the environment its
    /// subprocesses need.
    fn build_variables(
        &mut self,
        workspace: &Workspace,
        workspace_id: Option<&str>,
        dir: &Path,
        report: &mut MigrationReport,
    ) -> Result<BTreeMap<String, String>, MigrationError> {
        let config = self.config;
        let mut env = BTreeMap::new();

        let Some(workspace_id) = workspace_id else {
            let overrides = collect_sensitive_overrides(
                &workspace.name,
                &[],
                &config.workspace_sensitive_vars,
                &config.varset_sensitive_vars,
            )?;
            env.extend(overrides.env);
            return Ok(env);
        };

        let resolver = VariableSetResolver::new(self.client);
        let attached = resolver.variable_sets_for_workspace(workspace_id)?;
        let catalog = self.catalog()?;
        let set_names = catalog.names_for(&attached);
        let varset_vars = catalog.merged_variables(&attached);
        let workspace_vars = resolver.workspace_native_variables(workspace_id)?;

        let mut overrides = collect_sensitive_overrides(
            &workspace.name,
            &set_names,
            &config.workspace_sensitive_vars,
            &config.varset_sensitive_vars,
        )?;
        if let Some(name) = &config.token_variable_name {
            overrides.terraform.insert(name.as_str(), config.token.as_str());
        }

        let merged = aggregate(&workspace_vars, &varset_vars, &overrides.terraform);
        tracing::info!(
            variable_sets = set_names.len(),
            variables = merged.len(),
            sensitive_env = overrides.env.len(),
            "variables resolved"
        );

        let rendered = render_tfvars(&merged);
        report.vars_file = Some(write_vars_file(dir, &rendered.content)?);
        report.null_value_keys = rendered.null_keys;

        env.extend(overrides.env);
        env.insert(config.token_env_name(), config.token.clone());
        Ok(env)
    }

    fn catalog(&mut self) -> Result<&VariableSetCatalog, MigrationError> {
        let catalog = match self.catalog.take() {
            Some(catalog) => catalog,
            None => VariableSetResolver::new(self.client).load_catalog()?,
        };
        let catalog: &VariableSetCatalog = self.catalog.insert(catalog);
        Ok(catalog)
    }

    /// `tfswitch [version]` then `terraform init`.
    fn prepare_terraform(&self, dir: &Path, env: &BTreeMap<String, String>) -> Result<(), MigrationError> {
        let mut tfswitch = Invocation::new("tfswitch", dir).envs(env);
        if let Some(version) = &self.config.terraform_version {
            tfswitch = tfswitch.arg(version.as_str());
        }
        self.runner.run(&tfswitch)?;
        self.runner.run(&Invocation::new("terraform", dir).arg("init").envs(env))?;
        Ok(())
    }

    fn tfmigrate(&self, mode: MigrationMode, dir: &Path, env: &BTreeMap<String, String>) -> Invocation {
        Invocation::new("tfmigrate", dir)
            .arg(mode.as_str())
            .arg(format!("--config={}", self.config.tfmigrate_config))
            .envs(env)
    }
}
