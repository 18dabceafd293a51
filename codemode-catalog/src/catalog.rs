use std::collections::BTreeMap;

use codemode_tool::ToolRegistry;
use codemode_types::{AuthContext, ToolDefinition};

use crate::naming::{fold, operation_id};
use crate::operation::Operation;
use crate::spec::CodeModeSpec;

const MAX_SUGGESTIONS: usize = 5;
const MIN_SHARED_PREFIX: usize = 4;

/// Immutable set of operations a script may invoke, plus lookup indices.
///
/// Built fresh per execution from the registry's enabled tools. Every key of
/// the operation map has an [`Operation`], and operation ids are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityCatalog {
    operations: BTreeMap<String, Operation>,
    operation_map: BTreeMap<String, String>,
    by_tool_name: BTreeMap<String, String>,
}

impl CapabilityCatalog {
    /// Catalog of every tool enabled for `auth`, minus the code-mode
    /// meta-tools.
    #[must_use]
    pub fn build(registry: &ToolRegistry, auth: &AuthContext) -> Self {
        let catalog = Self::from_definitions(registry.enabled_definitions(auth));
        tracing::debug!(
            operations = catalog.len(),
            principal = ?auth.principal,
            "capability catalog built"
        );
        catalog
    }

    /// Catalog over an explicit list of definitions.
    ///
    /// Definitions are processed in name order so that colliding ids get the
    /// same numeric suffixes on every build.
    #[must_use]
    pub fn from_definitions(definitions: impl IntoIterator<Item = ToolDefinition>) -> Self {
        let mut definitions: Vec<ToolDefinition> = definitions
            .into_iter()
            .filter(|def| !def.is_code_mode())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions.dedup_by(|a, b| a.name == b.name);

        let mut catalog = Self::default();
        for def in &definitions {
            let id = catalog.unique_id(operation_id(&def.name));
            catalog.operation_map.insert(id.clone(), def.name.clone());
            catalog.by_tool_name.insert(def.name.clone(), id.clone());
            catalog
                .operations
                .insert(id.clone(), Operation::from_definition(id, def));
        }
        catalog
    }

    fn unique_id(&self, base: String) -> String {
        let mut candidate = base.clone();
        let mut n = 2;
        while self.operations.contains_key(&candidate) {
            candidate = format!("{base}{n}");
            n += 1;
        }
        candidate
    }

    /// Operations in id order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    /// Look up an operation by id.
    #[must_use]
    pub fn get(&self, operation_id: &str) -> Option<&Operation> {
        self.operations.get(operation_id)
    }

    /// The operation backed by `tool_name`.
    #[must_use]
    pub fn operation_for_tool(&self, tool_name: &str) -> Option<&Operation> {
        self.by_tool_name
            .get(tool_name)
            .and_then(|id| self.operations.get(id))
    }

    /// operationId -> toolName: the allow-list for sandboxed calls.
    #[must_use]
    pub fn operation_map(&self) -> &BTreeMap<String, String> {
        &self.operation_map
    }

    /// toolName -> operationId.
    #[must_use]
    pub fn by_tool_name(&self) -> &BTreeMap<String, String> {
        &self.by_tool_name
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the catalog has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The read-only object injected into the sandbox.
    #[must_use]
    pub fn to_spec(&self) -> CodeModeSpec {
        CodeModeSpec::from_operations(self.operations.values().cloned())
    }

    /// Operations whose id, tool name, group, summary or description
    /// contain `query`, case-insensitively. `None` or a blank query matches
    /// everything.
    #[must_use]
    pub fn search(&self, query: Option<&str>, limit: usize) -> Vec<&Operation> {
        let needle = query.map(str::trim).unwrap_or_default().to_lowercase();
        self.operations
            .values()
            .filter(|op| {
                needle.is_empty()
                    || [
                        op.operation_id.as_str(),
                        op.tool_name.as_str(),
                        op.group.as_deref().unwrap_or_default(),
                        op.summary.as_str(),
                        op.description.as_str(),
                    ]
                    .iter()
                    .any(|text| text.to_lowercase().contains(&needle))
            })
            .take(limit)
            .collect()
    }

    /// Ids that look like what `requested` meant: equal ignoring case and
    /// separators, containing one another, or sharing a long prefix. Tool
    /// names are accepted as spellings of their operation.
    #[must_use]
    pub fn suggest(&self, requested: &str) -> Vec<String> {
        let wanted = fold(requested);
        if wanted.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(usize, &String)> = self
            .operation_map
            .iter()
            .filter_map(|(id, tool)| {
                let candidate = fold(id);
                let score = if candidate == wanted || fold(tool) == wanted {
                    0
                } else if candidate.contains(&wanted) || wanted.contains(&candidate) {
                    1
                } else if shared_prefix(&candidate, &wanted) >= MIN_SHARED_PREFIX {
                    2
                } else {
                    return None;
                };
                Some((score, id))
            })
            .collect();
        scored.sort();
        scored
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

fn shared_prefix(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}
