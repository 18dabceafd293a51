use std::sync::Arc;

use codemode::*;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GreetArgs {
    name: String,
}

struct Greet;

impl Tool for Greet {
    const NAME: &'static str = "greet-user";
    type Args = GreetArgs;
    type Output = Value;
    type Error = std::io::Error;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            Self::NAME,
            "Greet a user by name. Returns a greeting object.",
            serde_json::to_value(schemars::schema_for!(GreetArgs)).unwrap(),
        )
    }

    async fn call(&self, args: GreetArgs, _ctx: &ToolContext) -> Result<Value, std::io::Error> {
        Ok(json!({ "greeting": format!("hello, {}", args.name) }))
    }
}

fn installed() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Greet);
    CodeMode::install(registry, CodeModeConfig::default())
}

#[test]
fn install_registers_both_meta_tools_in_their_group() {
    let registry = installed();
    for name in [ExecuteCodeTool::NAME, SearchOperationsTool::NAME] {
        let def = registry.get(name).expect("meta-tool registered").definition();
        assert!(def.is_code_mode(), "{name}");
    }
    assert_eq!(registry.len(), 3);
}

#[tokio::test]
async fn search_operations_lists_the_catalog_only() {
    let registry = installed();
    let output = registry
        .execute("search-operations", json!({}), &ToolContext::default())
        .await
        .unwrap();
    let found = output.structured_content.unwrap();
    assert_eq!(found["totalMatches"], 1);
    assert_eq!(found["operations"][0]["operationId"], "greetUser");
    assert_eq!(found["operations"][0]["toolName"], "greet-user");
}

#[tokio::test]
async fn search_operations_filters_by_query() {
    let registry = installed();
    let output = registry
        .execute("search-operations", json!({"query": "datasource"}), &ToolContext::default())
        .await
        .unwrap();
    let found = output.structured_content.unwrap();
    assert_eq!(found["totalMatches"], 0);
    assert_eq!(found["operations"], json!([]));
}

#[tokio::test]
async fn execute_code_reports_success_as_structured_content() {
    let registry = installed();
    let output = registry
        .execute(
            "execute-code",
            json!({"code": "async () => { console.info('go'); return tableau.operations.greetUser({ name: 'ada' }); }"}),
            &ToolContext::default(),
        )
        .await
        .unwrap();
    assert!(!output.is_error);
    let report = output.structured_content.unwrap();
    assert_eq!(report["result"], json!({"greeting": "hello, ada"}));
    assert_eq!(report["logs"], json!([{"level": "info", "message": "go"}]));
    assert_eq!(report["apiCalls"], 1);
    assert!(report["outputBytes"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn execute_code_reports_failures_as_error_output() {
    let registry = installed();
    let output = registry
        .execute(
            "execute-code",
            json!({"code": "async () => { throw new RangeError('too far'); }"}),
            &ToolContext::default(),
        )
        .await
        .unwrap();
    assert!(output.is_error);
    let error = &output.structured_content.unwrap()["error"];
    assert_eq!(error["kind"], "sandbox-fault");
    assert_eq!(error["message"], "RangeError: too far");
    assert!(error["stack"].as_str().unwrap().contains("too far"));
}

#[tokio::test]
async fn execute_code_requires_code() {
    let registry = installed();
    let err = registry
        .execute("execute-code", json!({"script": "x"}), &ToolContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidInput(_)), "{err}");
}

#[tokio::test]
async fn dropped_registry_is_a_fault() {
    let code_mode = CodeMode::new(std::sync::Weak::new(), CodeModeConfig::default());
    let err = code_mode
        .execute("async () => 1", &ToolContext::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SandboxFault);
    assert!(code_mode.catalog(&AuthContext::default()).is_err());
}
