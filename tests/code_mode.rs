//! End-to-end code-mode runs against fake Tableau tools.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use codemode::*;
use codemode_tool::{SchemaValidator, ToolFilter, TracingMiddleware};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fake Tableau tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const READ_SCOPE: &str = "tableau:content:read";

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
struct ListDatasourcesArgs {
    /// Optional name filter.
    #[serde(default)]
    filter: Option<String>,
}

#[derive(Debug, Serialize)]
struct Datasource {
    luid: &'static str,
    name: &'static str,
}

struct ListDatasources;

impl Tool for ListDatasources {
    const NAME: &'static str = "list-datasources";
    type Args = ListDatasourcesArgs;
    type Output = Vec<Datasource>;
    type Error = std::io::Error;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            Self::NAME,
            "List published datasources. Optionally filter by name.",
            serde_json::to_value(schemars::schema_for!(ListDatasourcesArgs)).unwrap(),
        )
        .with_group("datasource")
        .with_annotations(ToolAnnotations::read_only())
    }

    async fn call(
        &self,
        args: ListDatasourcesArgs,
        _ctx: &ToolContext,
    ) -> Result<Vec<Datasource>, std::io::Error> {
        let all = vec![
            Datasource { luid: "ds-superstore", name: "Superstore" },
            Datasource { luid: "ds-hr", name: "HR Headcount" },
        ];
        Ok(all
            .into_iter()
            .filter(|ds| args.filter.as_deref().is_none_or(|f| ds.name.contains(f)))
            .collect())
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ListFieldsArgs {
    datasource_luid: String,
}

struct ListFields;

impl ToolDyn for ListFields {
    fn name(&self) -> &str {
        "list-fields"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "list-fields",
            "List the fields of a datasource.",
            serde_json::to_value(schemars::schema_for!(ListFieldsArgs)).unwrap(),
        )
        .with_group("datasource")
        .with_required_scope(READ_SCOPE)
    }

    fn call_dyn<'a>(
        &'a self,
        input: Value,
        _ctx: &'a ToolContext,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let args: ListFieldsArgs =
                serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
            if args.datasource_luid == "ds-hr" {
                return Ok(ToolOutput::empty("no_results"));
            }
            Ok(ToolOutput::structured(json!({
                "data": [
                    {"fieldCaption": "Region", "dataType": "STRING"},
                    {"fieldCaption": "Sales", "dataType": "REAL"}
                ]
            })))
        })
    }
}

/// Records what reached the tool after normalization.
struct QueryDatasource {
    seen: Arc<Mutex<Vec<Value>>>,
}

impl ToolDyn for QueryDatasource {
    fn name(&self) -> &str {
        "query-datasource"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "query-datasource",
            "Run a VizQL query against a datasource. Returns rows.",
            json!({
                "type": "object",
                "properties": {
                    "datasourceLuid": {"type": "string"},
                    "query": {
                        "type": "object",
                        "properties": {
                            "fields": {"type": "array", "minItems": 1, "items": {"$ref": "#/$defs/field"}},
                            "filters": {"type": "array", "items": {"type": "object", "required": ["field", "filterType"]}}
                        },
                        "required": ["fields"]
                    }
                },
                "required": ["datasourceLuid", "query"],
                "additionalProperties": false,
                "$defs": {
                    "field": {
                        "type": "object",
                        "properties": {
                            "fieldCaption": {"type": "string"},
                            "function": {"enum": ["SUM", "AVG", "COUNT"]}
                        },
                        "required": ["fieldCaption"],
                        "additionalProperties": false
                    }
                }
            }),
        )
        .with_group("datasource")
        .with_required_scope(READ_SCOPE)
    }

    fn call_dyn<'a>(
        &'a self,
        input: Value,
        ctx: &'a ToolContext,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(input.clone());
            let rows: Vec<Value> = (0..500)
                .map(|i| json!({"Region": (["West", "East", "South"][i % 3]), "Sales": i * 10}))
                .collect();
            if let Some(progress) = &ctx.progress_reporter {
                let total = rows.len() as f64;
                progress.report(total, Some(total), Some("rows fetched"));
            }
            Ok(ToolOutput::structured(json!({ "data": rows })))
        })
    }
}

/// Never answers, until cancelled.
struct SlowReport;

impl ToolDyn for SlowReport {
    fn name(&self) -> &str {
        "slow-report"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "slow-report",
            "A report that takes forever.",
            json!({"type": "object"}),
        )
    }

    fn call_dyn<'a>(
        &'a self,
        _input: Value,
        ctx: &'a ToolContext,
    ) -> BoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            ctx.cancellation_token.cancelled().await;
            Err(ToolError::Cancelled)
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Harness {
    registry: Arc<ToolRegistry>,
    seen: Arc<Mutex<Vec<Value>>>,
}

fn harness_with(filter: ToolFilter, config: CodeModeConfig) -> Harness {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new().with_filter(filter);
    registry.register(ListDatasources);
    registry.register_dyn(Arc::new(ListFields));
    registry.register_dyn(Arc::new(QueryDatasource { seen: seen.clone() }));
    registry.register_dyn(Arc::new(SlowReport));
    registry.add_middleware(TracingMiddleware);
    let validator = SchemaValidator::new(&registry);
    registry.add_middleware(validator);
    Harness {
        registry: CodeMode::install(registry, config),
        seen,
    }
}

fn harness() -> Harness {
    harness_with(ToolFilter::allow_all(), CodeModeConfig::default())
}

fn analyst() -> ToolContext {
    ToolContext::new("req-e2e", AuthContext::scoped("analyst", [READ_SCOPE]))
}

/// Collects every progress report a tool sends.
#[derive(Default)]
struct RecordedProgress(Mutex<Vec<(f64, Option<f64>, Option<String>)>>);

impl ProgressReporter for RecordedProgress {
    fn report(&self, progress: f64, total: Option<f64>, message: Option<&str>) {
        self.0
            .lock()
            .unwrap()
            .push((progress, total, message.map(str::to_string)));
    }
}

async fn execute(registry: &ToolRegistry, code: &str, ctx: &ToolContext) -> ToolOutput {
    registry
        .execute("execute-code", json!({ "code": code }), ctx)
        .await
        .unwrap()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn one_script_composes_several_calls() {
    let h = harness();
    let output = execute(
        &h.registry,
        r#"async () => {
            const [ds] = await tableau.operations.listDatasources({ filter: "Super" });
            const fields = await tableau.operations.listFields({ datasourceId: ds.luid });
            const rows = await tableau.callTool("queryDatasource", {
                luid: ds.luid,
                query: {
                    fields: ["Region", { name: "Sales", aggregation: "sum" }],
                    filters: [{ field: "Region", operator: "IN", value: ["West", "East"] }],
                },
            });
            const total = rows.data.reduce((sum, row) => sum + row.Sales, 0);
            console.log("rows", rows.data.length, "truncated", rows.meta?.truncated ?? false);
            return { datasource: ds.name, fields: fields.data.map((f) => f.fieldCaption), total };
        }"#,
        &analyst(),
    )
    .await;

    assert!(!output.is_error, "{}", output.text_content());
    let report = output.structured_content.unwrap();
    assert_eq!(report["result"]["datasource"], "Superstore");
    assert_eq!(report["result"]["fields"], json!(["Region", "Sales"]));
    assert_eq!(report["result"]["total"], (0..500).map(|i| i * 10).sum::<i64>());
    assert_eq!(report["apiCalls"], 3);
    assert_eq!(report["logs"][0]["message"], "rows 500 truncated false");

    let seen = h.seen.lock().unwrap();
    assert_eq!(
        seen[0],
        json!({
            "datasourceLuid": "ds-superstore",
            "query": {
                "fields": [{"fieldCaption": "Region"}, {"fieldCaption": "Sales", "function": "SUM"}],
                "filters": [{"field": {"fieldCaption": "Region"}, "filterType": "SET", "values": ["West", "East"]}]
            }
        })
    );
}

#[tokio::test]
async fn meta_tools_are_not_callable_from_scripts() {
    let h = harness();
    let output = execute(
        &h.registry,
        r#"async () => {
            let recursion;
            try { await tableau.callTool("executeCode", { code: "async () => 1" }); }
            catch (e) { recursion = e.code; }
            return { ids: spec.operationIds, recursion };
        }"#,
        &analyst(),
    )
    .await;
    let report = output.structured_content.unwrap();
    assert_eq!(
        report["result"]["ids"],
        json!(["listDatasources", "listFields", "queryDatasource", "slowReport"])
    );
    assert_eq!(report["result"]["recursion"], "unknown-operation");
}

#[tokio::test]
async fn invalid_arguments_explain_the_fix() {
    let h = harness();
    let output = execute(
        &h.registry,
        r#"async () => {
            try {
                await tableau.operations.queryDatasource({ query: { fields: [] } });
            } catch (e) {
                return { code: e.code, details: e.details };
            }
        }"#,
        &analyst(),
    )
    .await;
    let result = &output.structured_content.unwrap()["result"];
    assert_eq!(result["code"], "invalid-arguments");
    let details = &result["details"];
    assert_eq!(details["operationId"], "queryDatasource");
    let issues: Vec<&str> = details["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["message"].as_str().unwrap())
        .collect();
    assert!(issues.contains(&"missing required property 'datasourceLuid'"), "{issues:?}");
    let paths: Vec<&str> = details["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"/query/fields"), "{paths:?}");
    assert_eq!(details["aliases"]["luid"], "datasourceLuid");
    assert!(details["example"]["query"]["fields"].is_array());
    assert!(h.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_outcomes_are_uniform() {
    let h = harness();
    let output = execute(
        &h.registry,
        r#"async () => tableau.operations.listFields({ datasourceLuid: "ds-hr" })"#,
        &analyst(),
    )
    .await;
    assert_eq!(
        output.structured_content.unwrap()["result"],
        json!({"data": [], "content": [], "meta": {"reason": "no_results"}})
    );
}

#[tokio::test]
async fn large_results_are_truncated_to_the_budget() {
    let config = CodeModeConfig::default()
        .with_sandbox(SandboxConfig::default().with_max_output_bytes(4 * 1024));
    let h = harness_with(ToolFilter::allow_all(), config);
    let output = execute(
        &h.registry,
        r#"async () => {
            const rows = await tableau.operations.queryDatasource({
                datasourceLuid: "ds-superstore",
                query: { fields: ["Region"] },
            });
            return rows.meta;
        }"#,
        &analyst(),
    )
    .await;
    let meta = &output.structured_content.unwrap()["result"];
    assert_eq!(meta["truncated"], true);
    assert_eq!(meta["totalItems"], 500);
    assert!(meta["returnedItems"].as_u64().unwrap() < 500);
}

#[tokio::test]
async fn scopes_shape_the_catalog() {
    let h = harness();
    let ctx = ToolContext::new("req-guest", AuthContext::scoped("guest", Vec::<String>::new()));
    let output = execute(
        &h.registry,
        r#"async () => {
            try { await tableau.operations.listFields({ datasourceLuid: "ds-superstore" }); }
            catch (e) { return { ids: spec.operationIds, code: e.message }; }
        }"#,
        &ctx,
    )
    .await;
    let result = &output.structured_content.unwrap()["result"];
    assert_eq!(result["ids"], json!(["listDatasources", "slowReport"]));
    assert!(result["code"].as_str().unwrap().contains("not a function"));
}

#[tokio::test]
async fn filtered_tools_are_invisible() {
    let h = harness_with(ToolFilter::excluding(["datasource"]), CodeModeConfig::default());
    let output = execute(&h.registry, "async () => tableau.listOperations()", &analyst()).await;
    assert_eq!(
        output.structured_content.unwrap()["result"],
        json!([{"operationId": "slowReport", "toolName": "slow-report", "group": null, "summary": "A report that takes forever."}])
    );
}

#[tokio::test]
async fn uncaught_failures_become_error_outputs() {
    let h = harness();
    let output = execute(
        &h.registry,
        r#"async () => tableau.operations.queryDatasource({ datasourceLuid: "x" })"#,
        &analyst(),
    )
    .await;
    assert!(output.is_error);
    let error = &output.structured_content.unwrap()["error"];
    assert_eq!(error["kind"], "invalid-arguments");
    assert!(error["details"]["hints"].is_array());
}

#[tokio::test]
async fn request_cancellation_stops_the_script() {
    let h = harness();
    let ctx = analyst();
    let token = ctx.cancellation_token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });
    let code = r#"async () => tableau.operations.slowReport({})"#;
    let output = execute(&h.registry, code, &ctx).await;
    assert!(output.is_error);
    assert_eq!(output.structured_content.unwrap()["error"]["kind"], "cancelled");
}

#[tokio::test]
async fn search_then_execute() {
    let h = harness();
    let found = h
        .registry
        .execute("search-operations", json!({"query": "vizql", "limit": 5}), &analyst())
        .await
        .unwrap()
        .structured_content
        .unwrap();
    assert_eq!(found["totalMatches"], 1);
    let id = found["operations"][0]["operationId"].as_str().unwrap().to_string();
    assert_eq!(id, "queryDatasource");

    let code = format!(
        "async () => (await tableau.operations.{id}({{ luid: 'ds-superstore', query: {{ fields: ['Sales'] }} }})).data.length"
    );
    let output = execute(&h.registry, &code, &analyst()).await;
    assert_eq!(output.structured_content.unwrap()["result"], 500);
}

#[tokio::test]
async fn tools_report_progress_through_the_callers_context() {
    let h = harness();
    let progress = Arc::new(RecordedProgress::default());
    let mut ctx = analyst();
    ctx.progress_reporter = Some(progress.clone());

    let output = execute(
        &h.registry,
        r#"async () => {
            const rows = await tableau.operations.queryDatasource({
                datasourceLuid: "ds-superstore",
                query: { fields: ["Region"] },
            });
            return rows.data.length;
        }"#,
        &ctx,
    )
    .await;

    assert!(!output.is_error, "{}", output.text_content());
    let reports = progress.0.lock().unwrap();
    assert_eq!(*reports, vec![(500.0, Some(500.0), Some("rows fetched".to_string()))]);
}
