//! Variable aggregation.
//!
//! Precedence, lowest to highest:
//!
//! 1. variable-set variables
//! 2. workspace variables
//! 3. terraform-category sensitive variables
//!
//! Env-category sensitive variables never reach the variables file; they are
//! handed to subprocesses as environment instead.

use statemigrate_core::{Category, SensitiveGroups, SensitiveVariables, VariableMap, WorkspaceName};

use crate::error::VarsError;

/// Merge the three scopes into the map written to the variables file.
pub fn aggregate(
    workspace_vars: &VariableMap,
    varset_vars: &VariableMap,
    sensitive_terraform: &VariableMap,
) -> VariableMap {
    varset_vars.merge(workspace_vars).merge(sensitive_terraform)
}

/// Partition one group of sensitive variables into `(env, terraform)`.
pub fn split_sensitive_variables(
    group: &str,
    vars: &SensitiveVariables,
) -> Result<(VariableMap, VariableMap), VarsError> {
    let mut env = VariableMap::new();
    let mut terraform = VariableMap::new();

    for (key, var) in vars {
        match Category::parse(&var.category) {
            Some(Category::Env) => env.insert(key.as_str(), var.value.as_str()),
            Some(Category::Terraform) => terraform.insert(key.as_str(), var.value.as_str()),
            None => {
                return Err(VarsError::InvalidCategory {
                    group: group.to_owned(),
                    key: key.clone(),
                    category: var.category.clone(),
                })
            }
        };
    }
    Ok((env, terraform))
}

/// Sensitive values that apply to one workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensitiveOverrides {
    /// Exported to subprocesses.
    pub env: VariableMap,
    /// Merged into the variables file with top precedence.
    pub terraform: VariableMap,
}

impl SensitiveOverrides {
    fn apply(&mut self, group: &str, vars: &SensitiveVariables) -> Result<(), VarsError> {
        let (env, terraform) = split_sensitive_variables(group, vars)?;
        self.env.extend_from(&env);
        self.terraform.extend_from(&terraform);
        Ok(())
    }
}

/// Collect the sensitive overrides for `workspace`.
///
/// Groups in `varset_groups` named after one of `attached_sets` apply first,
/// in ascending set name; the group in `workspace_groups` named after the
/// workspace applies last and wins.
pub fn collect_sensitive_overrides(
    workspace: &WorkspaceName,
    attached_sets: &[String],
    workspace_groups: &SensitiveGroups,
    varset_groups: &SensitiveGroups,
) -> Result<SensitiveOverrides, VarsError> {
    let mut names: Vec<&str> = attached_sets.iter().map(String::as_str).collect();
    names.sort_unstable();
    names.dedup();

    let mut overrides = SensitiveOverrides::default();
    for name in names {
        if let Some(vars) = varset_groups.get(name) {
            overrides.apply(name, vars)?;
        }
    }
    if let Some(vars) = workspace_groups.get(workspace.0.as_str()) {
        overrides.apply(&workspace.0, vars)?;
    }

    tracing::debug!(
        workspace = %workspace,
        env = overrides.env.len(),
        terraform = overrides.terraform.len(),
        "collected sensitive overrides"
    );
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use statemigrate_core::SensitiveVariable;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> VariableMap {
        pairs.iter().copied().collect()
    }

    fn sensitive(entries: &[(&str, &str, &str)]) -> SensitiveVariables {
        entries
            .iter()
            .map(|(k, v, c)| (k.to_string(), SensitiveVariable::new(*v, *c)))
            .collect()
    }

    #[test]
    fn sensitive_beats_workspace_beats_varset() {
        let merged = aggregate(
            &vars(&[("a", "ws"), ("b", "ws")]),
            &vars(&[("a", "set"), ("b", "set"), ("c", "set")]),
            &vars(&[("b", "secret")]),
        );
        assert_eq!(merged, vars(&[("a", "ws"), ("b", "secret"), ("c", "set")]));
    }

    #[test]
    fn disjoint_scopes_are_unioned() {
        let merged = aggregate(&vars(&[("a", "1")]), &vars(&[("b", "2")]), &VariableMap::new());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn split_partitions_by_category() {
        let (env, terraform) = split_sensitive_variables(
            "ws",
            &sensitive(&[("AWS_KEY", "k", "env"), ("db_password", "p", "terraform")]),
        )
        .unwrap();
        assert_eq!(env, vars(&[("AWS_KEY", "k")]));
        assert_eq!(terraform, vars(&[("db_password", "p")]));
    }

    #[rstest]
    #[case("foo")]
    #[case("")]
    #[case("ENV")]
    fn split_rejects_unknown_category(#[case] category: &str) {
        let err = split_sensitive_variables("ws", &sensitive(&[("x", "1", category)])).unwrap_err();
        match err {
            VarsError::InvalidCategory { group, key, category: got } => {
                assert_eq!(group, "ws");
                assert_eq!(key, "x");
                assert_eq!(got, category);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn workspace_group_overrides_varset_groups() {
        let workspace_groups = SensitiveGroups::from([
            ("w1".to_owned(), sensitive(&[("token", "from-ws", "terraform")])),
            ("w2".to_owned(), sensitive(&[("token", "other-ws", "terraform")])),
        ]);
        let varset_groups = SensitiveGroups::from([
            ("zeta".to_owned(), sensitive(&[("token", "from-zeta", "terraform"), ("K", "z", "env")])),
            ("alpha".to_owned(), sensitive(&[("K", "a", "env"), ("region", "eu", "terraform")])),
            ("unattached".to_owned(), sensitive(&[("leak", "x", "terraform")])),
        ]);

        let overrides = collect_sensitive_overrides(
            &WorkspaceName::from("w1"),
            &["zeta".to_owned(), "alpha".to_owned()],
            &workspace_groups,
            &varset_groups,
        )
        .unwrap();

        assert_eq!(overrides.env, vars(&[("K", "z")]));
        assert_eq!(overrides.terraform, vars(&[("region", "eu"), ("token", "from-ws")]));
    }

    #[test]
    fn no_matching_groups_yield_nothing() {
        let overrides = collect_sensitive_overrides(
            &WorkspaceName::from("w1"),
            &[],
            &SensitiveGroups::new(),
            &SensitiveGroups::new(),
        )
        .unwrap();
        assert_eq!(overrides, SensitiveOverrides::default());
    }

    #[test]
    fn invalid_category_in_workspace_group_fails() {
        let workspace_groups =
            SensitiveGroups::from([("w1".to_owned(), sensitive(&[("x", "1", "foo")]))]);
        let err = collect_sensitive_overrides(
            &WorkspaceName::from("w1"),
            &[],
            &workspace_groups,
            &SensitiveGroups::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'foo'"), "{err}");
    }
}
