//! # statemigrate-vars
//!
//! Builds a workspace's variables file.
//!
//! [`aggregate()`] merges the variable scopes by precedence and
//! [`render_tfvars`] turns the result into sorted `key = "value"` lines.
//! [`write_vars_file`] writes them owner-read-only.

pub mod aggregate;
pub mod error;
pub mod tfvars;
pub mod writer;

pub use aggregate::{aggregate, collect_sensitive_overrides, split_sensitive_variables, SensitiveOverrides};
pub use error::VarsError;
pub use tfvars::{escape_hcl, render_tfvars, RenderedVars};
pub use writer::{write_vars_file, VARS_FILE_NAME};
