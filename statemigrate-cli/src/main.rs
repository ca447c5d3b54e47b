//! statemigrate: run tfmigrate across Terraform Cloud workspaces.
//!
//! # Usage
//!
//! ```text
//! statemigrate migrate [--plan|--apply] [--workspace-root <dir>]
//! statemigrate vars [--workspace-root <dir>]
//! ```
//!
//! Configuration comes from the environment (`TerraformCloudOrganization`,
//! `TerraformCloudToken`, `IsApply`, `WorkspaceToDirectory`, ...). Logs go to
//! stderr and are filtered with `RUST_LOG` (default `info`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{migrate::MigrateArgs, vars::VarsArgs};

#[derive(Parser, Debug)]
#[command(
    name = "statemigrate",
    version,
    about = "Run Terraform state migrations across Terraform Cloud workspaces",
    long_about = None,
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write variables files and run tfmigrate for every workspace.
    Migrate(MigrateArgs),

    /// Only write the variables file for every workspace.
    Vars(VarsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    match cli.command {
        Commands::Migrate(args) => args.run(),
        Commands::Vars(args) => args.run(),
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
