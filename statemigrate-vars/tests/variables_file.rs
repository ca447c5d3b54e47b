//! End-to-end: scopes in, variables file out.

use statemigrate_core::{SensitiveGroups, SensitiveVariable, VariableMap, WorkspaceName};
use statemigrate_vars::{aggregate, collect_sensitive_overrides, render_tfvars, write_vars_file};
use tempfile::TempDir;

#[test]
fn sensitive_override_lands_in_written_file() {
    let workspace_vars: VariableMap = [("a", "1")].into_iter().collect();
    let varset_vars: VariableMap = [("b", "2")].into_iter().collect();
    let groups = SensitiveGroups::from([(
        "w1".to_owned(),
        [("b".to_owned(), SensitiveVariable::new("override", "terraform"))]
            .into_iter()
            .collect(),
    )]);

    let overrides = collect_sensitive_overrides(
        &WorkspaceName::from("w1"),
        &[],
        &groups,
        &SensitiveGroups::new(),
    )
    .unwrap();
    let merged = aggregate(&workspace_vars, &varset_vars, &overrides.terraform);
    let rendered = render_tfvars(&merged);

    let dir = TempDir::new().unwrap();
    let path = write_vars_file(dir.path(), &rendered.content).unwrap();
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "a = \"1\"\nb = \"override\"\n"
    );
}

#[test]
fn env_category_values_stay_out_of_the_file() {
    let groups = SensitiveGroups::from([(
        "w1".to_owned(),
        [("AWS_SECRET".to_owned(), SensitiveVariable::new("s3cr3t", "env"))]
            .into_iter()
            .collect(),
    )]);
    let overrides = collect_sensitive_overrides(
        &WorkspaceName::from("w1"),
        &[],
        &groups,
        &SensitiveGroups::new(),
    )
    .unwrap();

    let merged = aggregate(&VariableMap::new(), &VariableMap::new(), &overrides.terraform);
    assert!(!render_tfvars(&merged).content.contains("s3cr3t"));
    assert_eq!(overrides.env.get("AWS_SECRET"), Some("s3cr3t"));
}
