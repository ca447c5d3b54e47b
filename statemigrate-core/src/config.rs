//! Job configuration, read once from the process environment.
//!
//! # API pattern
//!
//! - `Config::from_lookup(|name| …)`: explicit source; used in tests
//! - `Config::from_env()`: reads `std::env`
//!
//! Both feed the same `(name, value)` pairs through `envy`, which maps them
//! onto a raw struct; domain parsing happens afterwards so every failure
//! keeps its `ConfigError` variant.
//!
//! Tests must never call `from_env`; always pass a lookup closure.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{
    MigrationMode, PostConfirmationPolicy, SensitiveGroups, SensitiveVariable,
    SensitiveVariables, TerraformVersion, Workspace, WorkspaceDirectory, WorkspaceName,
};

/// Default remote API base URL.
pub const DEFAULT_API_URL: &str = "https://app.terraform.io/api/v2";
/// Default root that workspace directories are relative to.
pub const DEFAULT_WORKSPACE_ROOT: &str = "/github/workspace";
/// Default tfmigrate configuration path, relative to the workspace directory.
pub const DEFAULT_TFMIGRATE_CONFIG: &str = "./dragondrop/tfmigrate/.tfmigrate.hcl";
/// Token value that switches the job into test mode.
const TEST_MODE_TOKEN: &str = "null";

const ORGANIZATION: &str = "TerraformCloudOrganization";
const TOKEN: &str = "TerraformCloudToken";
const IS_APPLY: &str = "IsApply";
const WORKSPACE_TO_DIRECTORY: &str = "WorkspaceToDirectory";
const TERRAFORM_VERSION: &str = "TerraformVersion";
const WORKSPACE_SENSITIVE_VARS: &str = "TerraformWorkspaceSensitiveVars";
const VARSET_SENSITIVE_VARS: &str = "TerraformVarSetSensitiveVars";
const TOKEN_VARIABLE_NAME: &str = "TerraformCloudVariableName";
const API_URL: &str = "TerraformCloudApiUrl";
const REQUEST_TIMEOUT: &str = "TerraformCloudRequestTimeoutSecs";
const POST_CONFIRMATION_POLICY: &str = "PostConfirmationPolicy";
const WORKSPACE_ROOT: &str = "GITHUB_WORKSPACE";
const TFMIGRATE_CONFIG: &str = "TfmigrateConfigPath";

/// Immutable configuration for one migration job.
#[derive(Clone)]
pub struct Config {
    pub organization: String,
    pub token: String,
    pub mode: MigrationMode,
    /// Workspace name → directory, iterated in ascending name order.
    pub workspace_to_directory: BTreeMap<WorkspaceName, WorkspaceDirectory>,
    pub terraform_version: Option<TerraformVersion>,
    /// Sensitive groups keyed by workspace name.
    pub workspace_sensitive_vars: SensitiveGroups,
    /// Sensitive groups keyed by variable-set name.
    pub varset_sensitive_vars: SensitiveGroups,
    /// Terraform variable that should receive the API token, if any.
    pub token_variable_name: Option<String>,
    pub api_url: String,
    /// Per-request deadline; `None` leaves the HTTP client defaults in place.
    pub request_timeout: Option<Duration>,
    pub post_confirmation_policy: PostConfirmationPolicy,
    pub workspace_root: PathBuf,
    pub tfmigrate_config: String,
}

// The token must never end up in logs, so Debug is written by hand.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("organization", &self.organization)
            .field("token", &"<redacted>")
            .field("mode", &self.mode)
            .field("workspace_to_directory", &self.workspace_to_directory)
            .field("terraform_version", &self.terraform_version)
            .field(
                "workspace_sensitive_groups",
                &self.workspace_sensitive_vars.keys().collect::<Vec<_>>(),
            )
            .field(
                "varset_sensitive_groups",
                &self.varset_sensitive_vars.keys().collect::<Vec<_>>(),
            )
            .field("token_variable_name", &self.token_variable_name)
            .field("api_url", &self.api_url)
            .field("request_timeout", &self.request_timeout)
            .field("post_confirmation_policy", &self.post_confirmation_policy)
            .field("workspace_root", &self.workspace_root)
            .field("tfmigrate_config", &self.tfmigrate_config)
            .finish()
    }
}

/// Every variable the job reads, in the casing the workflow sets them.
const VARIABLES: [&str; 13] = [
    ORGANIZATION,
    TOKEN,
    IS_APPLY,
    WORKSPACE_TO_DIRECTORY,
    TERRAFORM_VERSION,
    WORKSPACE_SENSITIVE_VARS,
    VARSET_SENSITIVE_VARS,
    TOKEN_VARIABLE_NAME,
    API_URL,
    REQUEST_TIMEOUT,
    POST_CONFIRMATION_POLICY,
    WORKSPACE_ROOT,
    TFMIGRATE_CONFIG,
];

/// Environment shape as envy sees it. envy lowercases variable names before
/// matching, hence the lowercase renames.
#[derive(Deserialize)]
struct EnvVars {
    #[serde(rename = "terraformcloudorganization")]
    organization: String,
    #[serde(rename = "terraformcloudtoken")]
    token: String,
    #[serde(rename = "isapply")]
    is_apply: String,
    #[serde(rename = "workspacetodirectory")]
    workspace_to_directory: String,
    #[serde(rename = "terraformversion", default)]
    terraform_version: Option<String>,
    #[serde(rename = "terraformworkspacesensitivevars", default)]
    workspace_sensitive_vars: Option<String>,
    #[serde(rename = "terraformvarsetsensitivevars", default)]
    varset_sensitive_vars: Option<String>,
    #[serde(rename = "terraformcloudvariablename", default)]
    token_variable_name: Option<String>,
    #[serde(rename = "terraformcloudapiurl", default = "default_api_url")]
    api_url: String,
    #[serde(rename = "terraformcloudrequesttimeoutsecs", default)]
    request_timeout_secs: Option<u64>,
    #[serde(rename = "postconfirmationpolicy", default)]
    post_confirmation_policy: Option<String>,
    #[serde(rename = "github_workspace", default = "default_workspace_root")]
    workspace_root: PathBuf,
    #[serde(rename = "tfmigrateconfigpath", default = "default_tfmigrate_config")]
    tfmigrate_config: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_owned()
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(DEFAULT_WORKSPACE_ROOT)
}

fn default_tfmigrate_config() -> String {
    DEFAULT_TFMIGRATE_CONFIG.to_owned()
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load from an arbitrary `name → value` source. Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_vars(
            VARIABLES
                .iter()
                .filter_map(|&name| lookup(name).map(|value| (name.to_owned(), value))),
        )
    }

    fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let present = vars
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty());
        let raw: EnvVars = envy::from_iter(present).map_err(env_error)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: EnvVars) -> Result<Self, ConfigError> {
        let mode = MigrationMode::from_is_apply(parse_bool(IS_APPLY, &raw.is_apply)?);
        let workspace_to_directory = parse_workspace_map(&raw.workspace_to_directory)?;

        let terraform_version = raw
            .terraform_version
            .map(|v| {
                v.trim().parse::<TerraformVersion>().map_err(|reason| ConfigError::Invalid {
                    name: TERRAFORM_VERSION,
                    reason,
                })
            })
            .transpose()?;

        let workspace_sensitive_vars = raw
            .workspace_sensitive_vars
            .map(|v| parse_sensitive_groups(WORKSPACE_SENSITIVE_VARS, &v))
            .transpose()?
            .unwrap_or_default();
        let varset_sensitive_vars = raw
            .varset_sensitive_vars
            .map(|v| parse_sensitive_groups(VARSET_SENSITIVE_VARS, &v))
            .transpose()?
            .unwrap_or_default();

        let post_confirmation_policy = raw
            .post_confirmation_policy
            .map(|v| {
                v.parse::<PostConfirmationPolicy>()
                    .map_err(|reason| ConfigError::Invalid {
                        name: POST_CONFIRMATION_POLICY,
                        reason,
                    })
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            organization: raw.organization,
            token: raw.token,
            mode,
            workspace_to_directory,
            terraform_version,
            workspace_sensitive_vars,
            varset_sensitive_vars,
            token_variable_name: raw.token_variable_name,
            api_url: raw.api_url.trim_end_matches('/').to_owned(),
            request_timeout: raw.request_timeout_secs.map(Duration::from_secs),
            post_confirmation_policy,
            workspace_root: raw.workspace_root,
            tfmigrate_config: raw.tfmigrate_config,
        })
    }

    /// `true` when the token is the literal `"null"`: no remote calls are made
    /// and no variables files are generated.
    pub fn is_test_mode(&self) -> bool {
        self.token == TEST_MODE_TOKEN
    }

    /// Configured workspaces in ascending name order, disabled ones included.
    pub fn workspaces(&self) -> Vec<Workspace> {
        self.workspace_to_directory
            .iter()
            .map(|(name, directory)| Workspace {
                name: name.clone(),
                directory: directory.clone(),
            })
            .collect()
    }

    /// Host part of the API URL (`app.terraform.io` for the default).
    pub fn api_host(&self) -> &str {
        let without_scheme = self
            .api_url
            .split_once("://")
            .map_or(self.api_url.as_str(), |(_, rest)| rest);
        let end = without_scheme
            .find(&['/', ':'][..])
            .unwrap_or(without_scheme.len());
        &without_scheme[..end]
    }

    /// Environment variable terraform reads the API token from for the
    /// configured host, e.g. `TF_TOKEN_app_terraform_io`.
    pub fn token_env_name(&self) -> String {
        let host = self.api_host().replace('-', "__").replace('.', "_");
        format!("TF_TOKEN_{host}")
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Missing required variables keep their own error; everything else envy
/// rejects (a non-numeric timeout, say) is reported as-is.
fn env_error(err: envy::Error) -> ConfigError {
    if let envy::Error::MissingValue(field) = &err {
        let field = field.to_string();
        if let Some(name) = VARIABLES
            .iter()
            .copied()
            .find(|name| name.eq_ignore_ascii_case(&field))
        {
            return ConfigError::Missing { name };
        }
    }
    ConfigError::Env(err)
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

/// Accepts a JSON object (`{"ws":"/dir/"}`) or the `ws:dir,ws2:dir2` form.
fn parse_workspace_map(
    raw: &str,
) -> Result<BTreeMap<WorkspaceName, WorkspaceDirectory>, ConfigError> {
    let trimmed = raw.trim();
    let pairs: BTreeMap<String, String> = if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).map_err(|source| ConfigError::Json {
            name: WORKSPACE_TO_DIRECTORY,
            source,
        })?
    } else {
        let mut pairs = BTreeMap::new();
        for entry in trimmed.split(',').filter(|e| !e.trim().is_empty()) {
            let (name, dir) = entry.split_once(':').ok_or_else(|| ConfigError::Invalid {
                name: WORKSPACE_TO_DIRECTORY,
                reason: format!("entry '{entry}' is not of the form name:directory"),
            })?;
            pairs.insert(name.trim().to_owned(), dir.trim().to_owned());
        }
        pairs
    };

    if pairs.is_empty() {
        return Err(ConfigError::Invalid {
            name: WORKSPACE_TO_DIRECTORY,
            reason: "no workspaces configured".to_owned(),
        });
    }
    if let Some(name) = pairs.keys().find(|k| k.is_empty()) {
        return Err(ConfigError::Invalid {
            name: WORKSPACE_TO_DIRECTORY,
            reason: format!("empty workspace name in entry '{name}:'"),
        });
    }

    Ok(pairs
        .into_iter()
        .map(|(name, dir)| (WorkspaceName(name), WorkspaceDirectory(dir)))
        .collect())
}

#[derive(Deserialize)]
struct RawSensitiveVariable {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Parses `{group: {key: {value, category}}}`.
///
/// Both fields are required; the category itself is not checked here.
fn parse_sensitive_groups(name: &'static str, raw: &str) -> Result<SensitiveGroups, ConfigError> {
    let parsed: BTreeMap<String, BTreeMap<String, RawSensitiveVariable>> =
        serde_json::from_str(raw).map_err(|source| ConfigError::Json { name, source })?;

    let mut groups = SensitiveGroups::new();
    for (group, vars) in parsed {
        let mut out = SensitiveVariables::new();
        for (key, var) in vars {
            let missing = |field| ConfigError::SensitiveField {
                name,
                group: group.clone(),
                key: key.clone(),
                field,
            };
            let value = var.value.ok_or_else(|| missing("value"))?;
            let category = var.category.ok_or_else(|| missing("category"))?;
            out.insert(key, SensitiveVariable { value, category });
        }
        groups.insert(group, out);
    }
    Ok(groups)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
