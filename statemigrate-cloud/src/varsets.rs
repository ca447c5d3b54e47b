//! Variable-set discovery and variable extraction.
//!
//! # Null policy
//!
//! The same rule applies to variable-set variables and workspace variables:
//! a JSON `null` value (how the API reports sensitive values it will not
//! reveal) is treated as unset and dropped; the three-character string
//! `"null"` is an ordinary value and kept verbatim.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use statemigrate_core::VariableMap;

use crate::client::{ApiTransport, CloudClient, Method};
use crate::error::{parse_json, CloudError};
use crate::schema::{VarSetListDocument, VariableListDocument};

/// Page size requested when walking paginated listings.
const PAGE_SIZE: u32 = 100;

/// Extract `key → value` from a variable listing, dropping JSON nulls.
pub fn extract_variables(operation: &'static str, body: &str) -> Result<VariableMap, CloudError> {
    let doc: VariableListDocument = parse_json(operation, body)?;
    Ok(doc
        .data
        .into_iter()
        .filter_map(|var| {
            let key = var.attributes.key;
            match var.attributes.value {
                Some(value) => Some((key, value)),
                None => {
                    tracing::debug!(key = %key, "skipping variable with null value");
                    None
                }
            }
        })
        .collect())
}

pub struct VariableSetResolver<'a, T> {
    client: &'a CloudClient<T>,
}

impl<'a, T: ApiTransport> VariableSetResolver<'a, T> {
    pub fn new(client: &'a CloudClient<T>) -> Self {
        Self { client }
    }

    /// Every variable set in the organization, `id → name`. Follows
    /// `meta.pagination.next-page` until the server stops reporting one.
    pub fn list_variable_sets(&self) -> Result<BTreeMap<String, String>, CloudError> {
        const OP: &str = "listVariableSets";
        let mut sets = BTreeMap::new();
        let mut page = 1;
        loop {
            let path = format!(
                "/organizations/{}/varsets?page%5Bnumber%5D={page}&page%5Bsize%5D={PAGE_SIZE}",
                self.client.organization()
            );
            let body = self.client.execute(OP, Method::Get, &path, None)?;
            let doc: VarSetListDocument = parse_json(OP, &body)?;
            let next = doc.next_page();
            sets.extend(doc.data.into_iter().map(|set| (set.id, set.attributes.name)));

            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }
        Ok(sets)
    }

    /// Variables defined in one variable set.
    pub fn variables_for_set(&self, set_id: &str) -> Result<VariableMap, CloudError> {
        const OP: &str = "getVarSetVars";
        let path = format!("/varsets/{set_id}/relationships/vars");
        let body = self.client.execute(OP, Method::Get, &path, None)?;
        extract_variables(OP, &body)
    }

    /// Ids of the variable sets attached to a workspace.
    pub fn variable_sets_for_workspace(&self, workspace_id: &str) -> Result<BTreeSet<String>, CloudError> {
        const OP: &str = "getWorkspaceVarSets";
        let path = format!("/workspaces/{workspace_id}/varsets");
        let body = self.client.execute(OP, Method::Get, &path, None)?;
        let doc: VarSetListDocument = parse_json(OP, &body)?;
        Ok(doc.data.into_iter().map(|set| set.id).collect())
    }

    /// Variables defined directly on a workspace (not through a set).
    pub fn workspace_native_variables(&self, workspace_id: &str) -> Result<VariableMap, CloudError> {
        const OP: &str = "getWorkspaceVars";
        let path = format!("/workspaces/{workspace_id}/vars");
        let body = self.client.execute(OP, Method::Get, &path, None)?;
        extract_variables(OP, &body)
    }

    /// Fetch the organization's set listing and every set's variables.
    pub fn load_catalog(&self) -> Result<VariableSetCatalog, CloudError> {
        let names = self.list_variable_sets()?;
        let mut variables = HashMap::with_capacity(names.len());
        for id in names.keys() {
            variables.insert(id.clone(), self.variables_for_set(id)?);
        }
        tracing::info!(variable_sets = names.len(), "loaded variable sets");
        Ok(VariableSetCatalog { names, variables })
    }
}

/// Every variable set of the organization with its contents. Loaded once per
/// job and shared by all workspaces.
#[derive(Debug, Clone, Default)]
pub struct VariableSetCatalog {
    names: BTreeMap<String, String>,
    variables: HashMap<String, VariableMap>,
}

impl VariableSetCatalog {
    pub fn new(names: BTreeMap<String, String>, variables: HashMap<String, VariableMap>) -> Self {
        Self { names, variables }
    }

    pub fn name(&self, set_id: &str) -> Option<&str> {
        self.names.get(set_id).map(String::as_str)
    }

    /// `set_ids` ordered by (name, id); unknown ids sort by id alone.
    fn ordered<'s>(&self, set_ids: &'s BTreeSet<String>) -> Vec<&'s str> {
        let mut ids: Vec<&str> = set_ids.iter().map(String::as_str).collect();
        ids.sort_by(|a, b| {
            (self.name(a).unwrap_or(""), *a).cmp(&(self.name(b).unwrap_or(""), *b))
        });
        ids
    }

    /// Names of the given sets, in merge order. Unknown ids are skipped.
    pub fn names_for(&self, set_ids: &BTreeSet<String>) -> Vec<String> {
        self.ordered(set_ids)
            .into_iter()
            .filter_map(|id| self.name(id).map(str::to_owned))
            .collect()
    }

    /// Union of the given sets' variables, merged in ascending set-name order.
    pub fn merged_variables(&self, set_ids: &BTreeSet<String>) -> VariableMap {
        let mut merged = VariableMap::new();
        for id in self.ordered(set_ids) {
            match self.variables.get(id) {
                Some(vars) => merged.extend_from(vars),
                None => tracing::warn!(set_id = id, "workspace references an unknown variable set"),
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingTransport;

    fn page_path(page: u32) -> String {
        format!("/organizations/acme/varsets?page%5Bnumber%5D={page}&page%5Bsize%5D=100")
    }

    #[test]
    fn null_values_are_dropped_and_null_strings_kept() {
        let body = r#"{
           "data":[
              {"id":"var-1","type":"vars","attributes":{"key":"varKey_1","value":"varVal_1","hcl":false}},
              {"id":"var-2","type":"vars","attributes":{"key":"varKey_2","value":null,"sensitive":true}},
              {"id":"var-3","type":"vars","attributes":{"key":"varKey_3","value":"null"}},
              {"id":"var-4","type":"vars","attributes":{"key":"varKey_4"}}
           ]
        }"#;
        let vars = extract_variables("getWorkspaceVars", body).unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("varKey_1"), Some("varVal_1"));
        assert_eq!(vars.get("varKey_3"), Some("null"));
        assert!(!vars.contains_key("varKey_2"));
        assert!(!vars.contains_key("varKey_4"));
    }

    #[test]
    fn malformed_variable_listing_is_a_parse_error() {
        let err = extract_variables("getVarSetVars", r#"{"data":{"id":"v"}}"#).unwrap_err();
        assert!(matches!(err, CloudError::Parse { operation: "getVarSetVars", .. }));
    }

    #[test]
    fn variable_set_listing_follows_pagination() {
        let transport = RecordingTransport::new()
            .respond(
                &page_path(1),
                r#"{"data":[{"id":"varset-1","attributes":{"name":"shared"}}],
                    "meta":{"pagination":{"current-page":1,"next-page":2}}}"#,
            )
            .respond(
                &page_path(2),
                r#"{"data":[{"id":"varset-2","attributes":{"name":"aws"}}],
                    "meta":{"pagination":{"current-page":2,"next-page":null}}}"#,
            );
        let client = CloudClient::new(&transport, "acme");

        let sets = VariableSetResolver::new(&client).list_variable_sets().unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets["varset-1"], "shared");
        assert_eq!(sets["varset-2"], "aws");
        assert_eq!(transport.calls().len(), 2);
    }

    #[test]
    fn workspace_variable_sets_are_ids() {
        let transport = RecordingTransport::new().respond(
            "/workspaces/ws-1/varsets",
            r#"{"data":[{"id":"varset-b","attributes":{"name":"b"}},{"id":"varset-a"}]}"#,
        );
        let client = CloudClient::new(&transport, "acme");

        let ids = VariableSetResolver::new(&client)
            .variable_sets_for_workspace("ws-1")
            .unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["varset-a", "varset-b"]);
    }

    #[test]
    fn catalog_loads_every_set() {
        let transport = RecordingTransport::new()
            .respond(
                &page_path(1),
                r#"{"data":[{"id":"varset-1","attributes":{"name":"shared"}}]}"#,
            )
            .respond(
                "/varsets/varset-1/relationships/vars",
                r#"{"data":[{"id":"v","attributes":{"key":"region","value":"us-east-1"}}]}"#,
            );
        let client = CloudClient::new(&transport, "acme");

        let catalog = VariableSetResolver::new(&client).load_catalog().unwrap();
        let ids = BTreeSet::from(["varset-1".to_owned()]);
        assert_eq!(catalog.merged_variables(&ids).get("region"), Some("us-east-1"));
        assert_eq!(catalog.names_for(&ids), vec!["shared"]);
    }

    #[test]
    fn failing_set_fetch_aborts_catalog() {
        let transport = RecordingTransport::new().respond(
            &page_path(1),
            r#"{"data":[{"id":"varset-1","attributes":{"name":"shared"}}]}"#,
        );
        let client = CloudClient::new(&transport, "acme");

        let err = VariableSetResolver::new(&client).load_catalog().unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn merged_variables_follow_set_name_order() {
        let names = BTreeMap::from([
            ("varset-1".to_owned(), "zeta".to_owned()),
            ("varset-2".to_owned(), "alpha".to_owned()),
        ]);
        let variables = HashMap::from([
            (
                "varset-1".to_owned(),
                [("k", "from-zeta"), ("z", "1")].into_iter().collect::<VariableMap>(),
            ),
            (
                "varset-2".to_owned(),
                [("k", "from-alpha"), ("a", "2")].into_iter().collect::<VariableMap>(),
            ),
        ]);
        let catalog = VariableSetCatalog::new(names, variables);
        let ids = BTreeSet::from(["varset-1".to_owned(), "varset-2".to_owned()]);

        let merged = catalog.merged_variables(&ids);
        assert_eq!(merged.get("k"), Some("from-zeta"), "later name wins");
        assert_eq!(merged.len(), 3);
        assert_eq!(catalog.names_for(&ids), vec!["alpha", "zeta"]);
    }

    #[test]
    fn unknown_set_ids_are_ignored() {
        let catalog = VariableSetCatalog::default();
        let ids = BTreeSet::from(["varset-missing".to_owned()]);
        assert!(catalog.merged_variables(&ids).is_empty());
        assert!(catalog.names_for(&ids).is_empty());
    }
}
