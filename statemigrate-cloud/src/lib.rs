//! # statemigrate-cloud
//!
//! Typed access to the remote state-management API.
//!
//! - [`client`]: [`ApiTransport`] seam, the `ureq` transport, and
//!   [`CloudClient`] (workspace id lookup)
//! - [`schema`]: JSON:API response/request documents per endpoint
//! - [`runs`]: run-status extraction and classification
//! - [`lifecycle`]: clearing blocking runs before an apply, refresh after it
//! - [`varsets`]: variable-set discovery and variable extraction

pub mod client;
pub mod error;
pub mod lifecycle;
pub mod runs;
pub mod schema;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod varsets;

pub use client::{ApiTransport, CloudClient, HttpTransport, Method};
pub use error::{CloudError, RequestFailure};
pub use lifecycle::{ClearedRuns, RunCoordinator};
pub use runs::{extract_run_statuses, RunStatus};
pub use varsets::{VariableSetCatalog, VariableSetResolver};
