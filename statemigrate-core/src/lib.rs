//! statemigrate core library: domain types and the environment-driven job configuration.
//!
//! Public API surface:
//! - [`types`]: newtypes, variable maps, and sensitive-variable groups
//! - [`config`]: environment-driven [`Config`] loader
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, DEFAULT_API_URL, DEFAULT_TFMIGRATE_CONFIG, DEFAULT_WORKSPACE_ROOT};
pub use error::ConfigError;
pub use types::{
    Category, MigrationMode, PostConfirmationPolicy, SensitiveGroups, SensitiveVariable,
    SensitiveVariables, TerraformVersion, VariableMap, Workspace, WorkspaceDirectory,
    WorkspaceName,
};
