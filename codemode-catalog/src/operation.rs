//! One invocable capability.

use std::collections::BTreeMap;

use codemode_types::{ToolAnnotations, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hints;

/// One catalog entry: an agent-facing id mapped to a concrete tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Stable camelCase identifier scripts call.
    pub operation_id: String,
    /// Registry key of the underlying tool.
    pub tool_name: String,
    /// Group the tool belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// One-line summary.
    pub summary: String,
    /// Full description.
    pub description: String,
    /// JSON Schema of the accepted arguments.
    pub request_body: Value,
    /// Illustrative argument objects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<OperationExample>,
    /// Convenience argument name -> canonical argument name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
    /// Hints copied from the tool's annotations.
    pub annotations: OperationAnnotations,
}

/// A named example argument object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationExample {
    /// `minimal`, `field-shorthand` or `filter-shorthand`.
    pub name: String,
    /// The arguments.
    pub args: Value,
}

/// Read-only and open-world hints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationAnnotations {
    /// Whether the operation only reads data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    /// Whether the operation reaches an external system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world: Option<bool>,
}

impl From<&ToolAnnotations> for OperationAnnotations {
    fn from(annotations: &ToolAnnotations) -> Self {
        Self {
            read_only: annotations.read_only_hint,
            open_world: annotations.open_world_hint,
        }
    }
}

impl Operation {
    /// Describe `def` as an operation with the given id.
    #[must_use]
    pub fn from_definition(operation_id: impl Into<String>, def: &ToolDefinition) -> Self {
        let schema = &def.input_schema;
        Self {
            operation_id: operation_id.into(),
            tool_name: def.name.clone(),
            group: def.group.clone(),
            summary: summarize(def),
            description: def.description.clone(),
            request_body: schema.clone(),
            examples: hints::examples_for(schema),
            aliases: hints::aliases_for(schema),
            annotations: def
                .annotations
                .as_ref()
                .map(OperationAnnotations::from)
                .unwrap_or_default(),
        }
    }

    /// The example with the given name.
    #[must_use]
    pub fn example(&self, name: &str) -> Option<&Value> {
        self.examples.iter().find(|e| e.name == name).map(|e| &e.args)
    }

    /// Whether `query.fields` / `query.filters` shorthand applies.
    #[must_use]
    pub fn accepts_query_shorthand(&self) -> bool {
        hints::query_shape(&self.request_body).is_some()
    }
}

fn summarize(def: &ToolDefinition) -> String {
    if let Some(title) = def.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return title.trim().to_string();
    }
    let first_line = def.description.lines().map(str::trim).find(|l| !l.is_empty());
    let Some(line) = first_line else {
        return def.name.clone();
    };
    match line.find(". ") {
        Some(end) => line[..=end].to_string(),
        None => line.to_string(),
    }
}
