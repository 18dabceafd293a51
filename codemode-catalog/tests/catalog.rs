use std::sync::Arc;

use codemode_catalog::*;
use codemode_tool::ToolRegistry;
use codemode_types::*;
use serde_json::json;

/// A tool that only has a definition; the catalog never calls it.
struct DefinitionOnly(ToolDefinition);

impl ToolDyn for DefinitionOnly {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn definition(&self) -> ToolDefinition {
        self.0.clone()
    }

    fn call_dyn<'a>(
        &'a self,
        _input: serde_json::Value,
        _ctx: &'a ToolContext,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async { Ok(ToolOutput::text("unused")) })
    }
}

fn query_datasource() -> ToolDefinition {
    ToolDefinition::new(
        "query-datasource",
        "Run a VizQL query against a published datasource. Returns rows.",
        json!({
            "type": "object",
            "properties": {
                "datasourceLuid": {"type": "string"},
                "query": {
                    "type": "object",
                    "properties": {
                        "fields": {"type": "array", "items": {"type": "object"}},
                        "filters": {"type": "array", "items": {"type": "object"}}
                    },
                    "required": ["fields"]
                }
            },
            "required": ["datasourceLuid", "query"]
        }),
    )
    .with_group("query")
    .with_annotations(ToolAnnotations::read_only())
    .with_required_scope("tableau:viz_data_service:read")
}

fn list_datasources() -> ToolDefinition {
    ToolDefinition::new(
        "list-datasources",
        "List published datasources.\nSupports filtering by name.",
        json!({"type": "object", "properties": {"filter": {"type": "string"}}}),
    )
    .with_group("metadata")
}

fn execute_code() -> ToolDefinition {
    ToolDefinition::new("execute-code", "Run a script", json!({"type": "object"}))
        .with_group(CODE_MODE_GROUP)
}

fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for def in [query_datasource(), list_datasources(), execute_code()] {
        registry.register_dyn(Arc::new(DefinitionOnly(def)));
    }
    registry
}

#[test]
fn operation_map_matches_operations_and_skips_meta_tools() {
    let catalog = CapabilityCatalog::build(&registry(), &AuthContext::default());

    assert_eq!(catalog.len(), 2);
    for op in catalog.operations() {
        assert_eq!(catalog.operation_map().get(&op.operation_id), Some(&op.tool_name));
        assert_eq!(catalog.by_tool_name().get(&op.tool_name), Some(&op.operation_id));
        assert_ne!(op.group.as_deref(), Some(CODE_MODE_GROUP));
    }
    assert!(catalog.get("executeCode").is_none());
    assert_eq!(
        catalog.operation_map().keys().collect::<Vec<_>>(),
        vec!["listDatasources", "queryDatasource"]
    );
}

#[test]
fn unauthorized_tools_are_not_cataloged() {
    let auth = AuthContext::scoped("viewer", ["tableau:content:read"]);
    let catalog = CapabilityCatalog::build(&registry(), &auth);
    assert!(catalog.get("queryDatasource").is_none());
    assert!(catalog.get("listDatasources").is_some());
}

#[test]
fn filtered_tools_are_not_cataloged() {
    let mut registry =
        ToolRegistry::new().with_filter(codemode_tool::ToolFilter::excluding(["metadata"]));
    for def in [query_datasource(), list_datasources()] {
        registry.register_dyn(Arc::new(DefinitionOnly(def)));
    }
    let catalog = CapabilityCatalog::build(&registry, &AuthContext::default());
    assert_eq!(catalog.operation_map().len(), 1);
    assert!(catalog.operation_for_tool("query-datasource").is_some());
}

#[test]
fn empty_registry_yields_empty_catalog() {
    let catalog = CapabilityCatalog::build(&ToolRegistry::new(), &AuthContext::default());
    assert!(catalog.is_empty());
    let spec = serde_json::to_value(catalog.to_spec()).unwrap();
    assert_eq!(
        spec,
        json!({"operations": {}, "operationList": [], "operationIds": [], "paths": {}})
    );
}

#[test]
fn operation_fields_are_derived_from_the_definition() {
    let catalog = CapabilityCatalog::from_definitions([query_datasource(), list_datasources()]);
    let op = catalog.get("queryDatasource").unwrap();

    assert_eq!(op.tool_name, "query-datasource");
    assert_eq!(op.group.as_deref(), Some("query"));
    assert_eq!(op.summary, "Run a VizQL query against a published datasource.");
    assert_eq!(op.request_body, query_datasource().input_schema);
    assert_eq!(op.annotations.read_only, Some(true));
    assert_eq!(op.annotations.open_world, Some(true));
    assert_eq!(op.aliases.get("datasourceId").map(String::as_str), Some("datasourceLuid"));
    assert_eq!(op.aliases.len(), 4);
    assert!(op.accepts_query_shorthand());

    let listing = catalog.get("listDatasources").unwrap();
    assert_eq!(listing.summary, "List published datasources.");
    assert!(listing.aliases.is_empty());
    assert!(!listing.accepts_query_shorthand());
    assert_eq!(listing.annotations, OperationAnnotations::default());
}

#[test]
fn query_operations_carry_minimal_and_shorthand_examples() {
    let catalog = CapabilityCatalog::from_definitions([query_datasource()]);
    let op = catalog.get("queryDatasource").unwrap();

    let names: Vec<&str> = op.examples.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["minimal", "field-shorthand", "filter-shorthand"]);
    assert_eq!(
        op.example("minimal").unwrap(),
        &json!({"datasourceLuid": "<datasourceLuid>", "query": {"fields": [{}]}})
    );
    assert_eq!(
        op.example("field-shorthand").unwrap()["query"]["fields"][1],
        json!({"name": "Sales", "aggregation": "sum"})
    );
    assert_eq!(
        op.example("filter-shorthand").unwrap()["query"]["filters"][1]["operator"],
        "GREATER_THAN"
    );
}

#[test]
fn colliding_ids_get_stable_suffixes() {
    let a = ToolDefinition::new("get-view", "", json!({}));
    let b = ToolDefinition::new("get_view", "", json!({}));
    let first = CapabilityCatalog::from_definitions([b.clone(), a.clone()]);
    let second = CapabilityCatalog::from_definitions([a, b]);

    assert_eq!(first, second);
    assert_eq!(first.operation_map().get("getView").map(String::as_str), Some("get-view"));
    assert_eq!(first.operation_map().get("getView2").map(String::as_str), Some("get_view"));
}

#[test]
fn spec_lists_operations_in_every_form() {
    let catalog = CapabilityCatalog::from_definitions([query_datasource(), list_datasources()]);
    let spec = catalog.to_spec();

    assert_eq!(spec.operation_ids, vec!["listDatasources", "queryDatasource"]);
    assert_eq!(spec.operation_list.len(), 2);
    assert_eq!(spec.operations["queryDatasource"].tool_name, "query-datasource");
    assert!(spec.paths.is_empty());

    let wire = serde_json::to_value(&spec).unwrap();
    assert_eq!(wire["operations"]["queryDatasource"]["toolName"], "query-datasource");
    assert_eq!(wire["operationList"][0]["operationId"], "listDatasources");
}

#[test]
fn search_matches_any_descriptive_field() {
    let catalog = CapabilityCatalog::from_definitions([query_datasource(), list_datasources()]);

    let hits: Vec<&str> = catalog
        .search(Some("VIZQL"), 10)
        .into_iter()
        .map(|op| op.operation_id.as_str())
        .collect();
    assert_eq!(hits, vec!["queryDatasource"]);
    assert_eq!(catalog.search(Some("metadata"), 10).len(), 1);
    assert_eq!(catalog.search(None, 10).len(), 2);
    assert_eq!(catalog.search(Some("  "), 1).len(), 1);
    assert!(catalog.search(Some("pulse"), 10).is_empty());
}

#[test]
fn suggestions_tolerate_case_separators_and_prefixes() {
    let catalog = CapabilityCatalog::from_definitions([query_datasource(), list_datasources()]);

    assert_eq!(catalog.suggest("query_datasource"), vec!["queryDatasource"]);
    assert_eq!(catalog.suggest("QueryDataSource"), vec!["queryDatasource"]);
    assert_eq!(catalog.suggest("listDatasource"), vec!["listDatasources"]);
    assert_eq!(catalog.suggest("queryData"), vec!["queryDatasource"]);
    assert!(catalog.suggest("deleteEverything").is_empty());
    assert!(catalog.suggest("").is_empty());
}
