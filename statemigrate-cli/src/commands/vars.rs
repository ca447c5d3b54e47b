//! `statemigrate vars`: write variables files only.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use statemigrate_runner::{Orchestrator, SystemRunner};

#[derive(Args, Debug)]
pub struct VarsArgs {
    /// Directory the workspace directories are relative to, overriding
    /// `GITHUB_WORKSPACE`.
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,
}

impl VarsArgs {
    pub fn run(self) -> Result<()> {
        let config = super::load_config(self.workspace_root)?;
        let client = super::client(&config);
        let summary = Orchestrator::new(&config, &client, SystemRunner)
            .write_all_variables_files()
            .context("variables file generation failed")?;

        super::print_summary(&summary);
        Ok(())
    }
}
