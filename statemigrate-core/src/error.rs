//! Error types for statemigrate-core.

use thiserror::Error;

/// Malformed or missing job configuration. Always fatal: raised before any
/// workspace is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was absent or empty.
    #[error("missing required configuration variable {name}")]
    Missing { name: &'static str },

    /// A JSON-valued variable failed to parse.
    #[error("failed to parse {name} as JSON: {source}")]
    Json {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A variable was present but its value is not acceptable.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    /// The environment could not be mapped onto the configuration shape.
    #[error("cannot read configuration from the environment: {0}")]
    Env(#[source] envy::Error),

    /// A sensitive-variable entry lacks its `value` or `category` field.
    #[error("{name}: no '{field}' field in group {group} for key {key}")]
    SensitiveField {
        name: &'static str,
        group: String,
        key: String,
        field: &'static str,
    },
}
