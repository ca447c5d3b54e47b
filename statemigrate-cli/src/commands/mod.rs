pub mod migrate;
pub mod vars;

use std::path::PathBuf;

use anyhow::{Context, Result};
use statemigrate_cloud::{CloudClient, HttpTransport};
use statemigrate_core::Config;
use statemigrate_runner::{JobSummary, MigrationReport};

/// Load configuration from the environment, then apply flag overrides.
fn load_config(workspace_root: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::from_env().context("invalid job configuration")?;
    if let Some(root) = workspace_root {
        config.workspace_root = root;
    }
    Ok(config)
}

fn client(config: &Config) -> CloudClient<HttpTransport> {
    CloudClient::new(HttpTransport::from_config(config), config.organization.clone())
}

fn print_summary(summary: &JobSummary) {
    for report in &summary.reports {
        print_report(report);
    }
    for name in &summary.skipped {
        println!("· '{name}' skipped (directory is \"null\")");
    }
    if summary.test_mode {
        println!("Ran in test mode: no remote calls were made and no variables files were written.");
    }
}

fn print_report(report: &MigrationReport) {
    let cleared = &report.cleared_runs;
    let mut details = Vec::new();
    if let Some(path) = &report.vars_file {
        details.push(format!("vars {}", path.display()));
    }
    if !cleared.discarded.is_empty() {
        details.push(format!("{} run(s) discarded", cleared.discarded.len()));
    }
    if !cleared.canceled.is_empty() {
        details.push(format!("{} run(s) canceled", cleared.canceled.len()));
    }
    if report.refresh_triggered {
        details.push("refresh queued".to_owned());
    }

    if details.is_empty() {
        println!("✓ '{}' {} {}", report.workspace, report.mode, report.stage());
    } else {
        println!(
            "✓ '{}' {} {} ({})",
            report.workspace,
            report.mode,
            report.stage(),
            details.join(", ")
        );
    }

    for run_id in &cleared.post_confirmation {
        println!("  ! run {run_id} is past confirmation and was left running");
    }
    for key in &report.null_value_keys {
        println!("  ! variable '{key}' has the value \"null\"; consider supplying it as a sensitive variable");
    }
}
