//! # statemigrate-runner
//!
//! Drives the per-workspace migration: builds the variables file, runs
//! `tfswitch`, `terraform init` and `tfmigrate`, and in apply mode clears
//! blocking runs before the migration and queues a refresh after it.

pub mod error;
pub mod orchestrator;
pub mod subprocess;

pub use error::MigrationError;
pub use orchestrator::{JobSummary, MigrationReport, Orchestrator, Stage};
pub use subprocess::{CommandRunner, Invocation, SystemRunner};
