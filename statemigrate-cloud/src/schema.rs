//! JSON:API documents exchanged with the remote API.
//!
//! Only the fields the job reads are modelled; everything else is ignored.
//! Optional fields default so a sparse record still decodes.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// `{ "data": … , "meta": … }`
#[derive(Debug, Deserialize)]
pub struct Document<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Option<Meta>,
}

/// A resource object. Attributes default when a record omits them.
#[derive(Debug, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    #[serde(default)]
    pub attributes: A,
}

#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    #[serde(rename = "next-page", default)]
    pub next_page: Option<u32>,
}

impl<T> Document<T> {
    /// Next page number, if the server reported one.
    pub fn next_page(&self) -> Option<u32> {
        self.meta
            .as_ref()
            .and_then(|m| m.pagination.as_ref())
            .and_then(|p| p.next_page)
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// `GET /organizations/{org}/workspaces/{name}`. Only the id is read.
#[derive(Debug, Default, Deserialize)]
pub struct WorkspaceAttributes {}

#[derive(Debug, Default, Deserialize)]
pub struct RunAttributes {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub actions: RunActions,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct RunActions {
    #[serde(rename = "is-cancelable", default)]
    pub is_cancelable: bool,
    #[serde(rename = "is-discardable", default)]
    pub is_discardable: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct VarSetAttributes {
    #[serde(default)]
    pub name: String,
}

/// A variable record. `value` is `None` for JSON `null` (e.g. sensitive values
/// the API will not reveal).
#[derive(Debug, Default, Deserialize)]
pub struct VariableAttributes {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

pub type WorkspaceDocument = Document<Resource<WorkspaceAttributes>>;
pub type RunListDocument = Document<Vec<Resource<RunAttributes>>>;
pub type VarSetListDocument = Document<Vec<Resource<VarSetAttributes>>>;
pub type VariableListDocument = Document<Vec<Resource<VariableAttributes>>>;

// ---------------------------------------------------------------------------
// Run creation
// ---------------------------------------------------------------------------

/// Body of `POST /runs` for a refresh-only, plan-only run.
#[derive(Debug, Serialize)]
pub struct CreateRunRequest<'a> {
    pub data: CreateRunData<'a>,
}

#[derive(Debug, Serialize)]
pub struct CreateRunData<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attributes: CreateRunAttributes,
    pub relationships: CreateRunRelationships<'a>,
}

#[derive(Debug, Serialize)]
pub struct CreateRunAttributes {
    #[serde(rename = "refresh-only")]
    pub refresh_only: bool,
    #[serde(rename = "plan-only")]
    pub plan_only: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateRunRelationships<'a> {
    pub workspace: Relationship<'a>,
}

#[derive(Debug, Serialize)]
pub struct Relationship<'a> {
    pub data: ResourceIdentifier<'a>,
}

#[derive(Debug, Serialize)]
pub struct ResourceIdentifier<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl<'a> CreateRunRequest<'a> {
    pub fn refresh_only_plan(workspace_id: &'a str) -> Self {
        Self {
            data: CreateRunData {
                kind: "runs",
                attributes: CreateRunAttributes {
                    refresh_only: true,
                    plan_only: true,
                },
                relationships: CreateRunRelationships {
                    workspace: Relationship {
                        data: ResourceIdentifier {
                            id: workspace_id,
                            kind: "workspaces",
                        },
                    },
                },
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
