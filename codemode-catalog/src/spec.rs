use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operation::Operation;

/// The read-only capability description scripts see as `spec`.
///
/// Its shape never depends on which tools are registered: an empty catalog
/// still serializes all four members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeModeSpec {
    /// Operations keyed by id.
    pub operations: BTreeMap<String, Operation>,
    /// The same operations as a list, in id order.
    pub operation_list: Vec<Operation>,
    /// Every operation id, in order.
    pub operation_ids: Vec<String>,
    /// Reserved for path-style lookups. Always empty.
    pub paths: BTreeMap<String, Value>,
}

impl CodeModeSpec {
    /// Build the spec from a set of operations.
    #[must_use]
    pub fn from_operations(operations: impl IntoIterator<Item = Operation>) -> Self {
        let operations: BTreeMap<String, Operation> = operations
            .into_iter()
            .map(|op| (op.operation_id.clone(), op))
            .collect();
        Self {
            operation_list: operations.values().cloned().collect(),
            operation_ids: operations.keys().cloned().collect(),
            operations,
            paths: BTreeMap::new(),
        }
    }
}
