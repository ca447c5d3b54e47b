//! `statemigrate migrate`: variables files plus tfmigrate per workspace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use statemigrate_core::MigrationMode;
use statemigrate_runner::{Orchestrator, SystemRunner};

/// Arguments for `statemigrate migrate`.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Run `tfmigrate plan`, overriding `IsApply`.
    #[arg(long, conflicts_with = "apply")]
    pub plan: bool,

    /// Run `tfmigrate apply`, overriding `IsApply`.
    #[arg(long)]
    pub apply: bool,

    /// Directory the workspace directories are relative to, overriding
    /// `GITHUB_WORKSPACE`.
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,
}

impl MigrateArgs {
    fn mode_override(&self) -> Option<MigrationMode> {
        match (self.plan, self.apply) {
            (true, _) => Some(MigrationMode::Plan),
            (_, true) => Some(MigrationMode::Apply),
            _ => None,
        }
    }

    pub fn run(self) -> Result<()> {
        let mut config = super::load_config(self.workspace_root.clone())?;
        if let Some(mode) = self.mode_override() {
            config.mode = mode;
        }

        let client = super::client(&config);
        let summary = Orchestrator::new(&config, &client, SystemRunner)
            .migrate_all()
            .with_context(|| format!("{} migration job failed", config.mode))?;

        super::print_summary(&summary);
        println!("State migration job finished ({}).", config.mode);
        Ok(())
    }
}
