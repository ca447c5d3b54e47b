//! Domain types for state migration jobs.
//!
//! All path fields use `PathBuf`; variable maps are ordered (`BTreeMap`) so
//! every rendering of them is deterministic.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// The name of a remote workspace as configured for the job.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkspaceName(pub String);

impl fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for WorkspaceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkspaceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Sentinel directory value meaning "this workspace is intentionally disabled".
const DISABLED_DIRECTORY: &str = "null";

/// A workspace's configuration directory, relative to the job's workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceDirectory(pub String);

impl WorkspaceDirectory {
    /// `true` when the directory is the `"null"` sentinel.
    pub fn is_disabled(&self) -> bool {
        self.0 == DISABLED_DIRECTORY
    }

    /// Join onto `root`. Leading separators are ignored so `/infra/` and
    /// `infra` resolve to the same place.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        let relative = self.0.trim_start_matches(&['/', '\\'][..]);
        if relative.is_empty() {
            root.to_path_buf()
        } else {
            root.join(relative)
        }
    }
}

impl fmt::Display for WorkspaceDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for WorkspaceDirectory {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for WorkspaceDirectory {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A configured workspace. Immutable once the job starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub name: WorkspaceName,
    pub directory: WorkspaceDirectory,
}

/// A validated `MAJOR.MINOR.PATCH` terraform version (major `0` or `1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerraformVersion(String);

impl TerraformVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerraformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TerraformVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(format!(
                "expected three '.'-separated components, got {}",
                parts.len()
            ));
        }
        if parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(format!("components must be numeric, got '{s}'"));
        }
        if parts[0] != "0" && parts[0] != "1" {
            return Err(format!(
                "major version must be either '0' or '1', got '{}'",
                parts[0]
            ));
        }
        Ok(Self(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether the job runs `tfmigrate plan` or `tfmigrate apply`. Fixed for the
/// whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationMode {
    #[default]
    Plan,
    Apply,
}

impl MigrationMode {
    pub fn from_is_apply(is_apply: bool) -> Self {
        if is_apply {
            Self::Apply
        } else {
            Self::Plan
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MigrationMode::Plan => "plan",
            MigrationMode::Apply => "apply",
        }
    }

    pub fn is_apply(self) -> bool {
        matches!(self, MigrationMode::Apply)
    }
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a run that already passed user confirmation is found on
/// a workspace about to be migrated. Such runs are never discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostConfirmationPolicy {
    /// Log a warning and continue with the migration.
    #[default]
    Warn,
    /// Fail the workspace before touching any run.
    Abort,
}

impl FromStr for PostConfirmationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "abort" => Ok(Self::Abort),
            other => Err(format!("expected 'warn' or 'abort', got '{other}'")),
        }
    }
}

/// Destination of a sensitive variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Exported to the environment of the migration subprocesses.
    Env,
    /// Written into the variables file.
    Terraform,
}

impl Category {
    /// Parses the configuration spelling (`"env"` / `"terraform"`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "env" => Some(Self::Env),
            "terraform" => Some(Self::Terraform),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Env => "env",
            Category::Terraform => "terraform",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Flat key → value mapping; the unit of merge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableMap(BTreeMap<String, String>);

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Right-biased union: keys of both maps, `other` wins on conflicts.
    /// Neither input is modified.
    pub fn merge(&self, other: &VariableMap) -> VariableMap {
        let mut merged = self.clone();
        merged.extend_from(other);
        merged
    }

    /// In-place form of [`VariableMap::merge`].
    pub fn extend_from(&mut self, other: &VariableMap) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for VariableMap {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A sensitive value supplied out-of-band through job configuration.
///
/// `category` is kept as written; it is validated when the variables are
/// split into their env and terraform subsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveVariable {
    pub value: String,
    pub category: String,
}

impl SensitiveVariable {
    pub fn new(value: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            category: category.into(),
        }
    }
}

/// Key → sensitive variable for one group.
pub type SensitiveVariables = BTreeMap<String, SensitiveVariable>;

/// Group name (workspace name or variable-set name) → its sensitive variables.
pub type SensitiveGroups = BTreeMap<String, SensitiveVariables>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
