//! Error types for statemigrate-runner.

use std::path::PathBuf;

use thiserror::Error;

use statemigrate_cloud::CloudError;
use statemigrate_core::WorkspaceName;
use statemigrate_vars::VarsError;

use crate::orchestrator::Stage;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// An external tool exited unsuccessfully. `output` is stderr followed
    /// by stdout.
    #[error("`{program} {}` failed ({status}):\n{output}", .args.join(" "))]
    Subprocess {
        program: String,
        args: Vec<String>,
        status: String,
        output: String,
    },

    /// An I/O error, with annotated path (or program name) for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Vars(#[from] VarsError),

    /// Names the workspace that failed and the last stage it completed.
    #[error("workspace {workspace} failed after {stage}: {source}")]
    Workspace {
        workspace: WorkspaceName,
        stage: Stage,
        #[source]
        source: Box<MigrationError>,
    },
}

impl MigrationError {
    /// The innermost error, looking through [`MigrationError::Workspace`].
    pub fn root(&self) -> &MigrationError {
        match self {
            MigrationError::Workspace { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience constructor for [`MigrationError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> MigrationError {
    MigrationError::Io {
        path: path.into(),
        source,
    }
}
