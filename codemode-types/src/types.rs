//! Tool definitions, tool output, and the per-request context.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Group name shared by the code-mode meta-tools.
///
/// Tools in this group are never exposed to sandboxed scripts.
pub const CODE_MODE_GROUP: &str = "code-mode";

/// A content item within a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentItem {
    /// Plain text content.
    Text(String),
    /// An image.
    Image {
        /// MIME type (e.g. "image/png").
        media_type: String,
        /// Base64-encoded data.
        data: String,
    },
}

/// Definition of a tool held by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (unique identifier, kebab-case by convention).
    pub name: String,
    /// Optional human-readable title.
    pub title: Option<String>,
    /// Description of what the tool does.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: serde_json::Value,
    /// Optional behavioral annotations (MCP spec).
    pub annotations: Option<ToolAnnotations>,
    /// Group the tool belongs to, used by include/exclude filters.
    pub group: Option<String>,
    /// Scopes the caller must hold for the tool to be enabled.
    pub required_scopes: Vec<String>,
}

impl ToolDefinition {
    /// Create a definition with no title, annotations, group or scopes.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
            input_schema,
            annotations: None,
            group: None,
            required_scopes: Vec::new(),
        }
    }

    /// Set the tool group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the behavioral annotations.
    #[must_use]
    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Require a scope for this tool to be enabled.
    #[must_use]
    pub fn with_required_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scopes.push(scope.into());
        self
    }

    /// Whether this tool belongs to the code-mode meta-tool group.
    #[must_use]
    pub fn is_code_mode(&self) -> bool {
        self.group.as_deref() == Some(CODE_MODE_GROUP)
    }
}

/// Behavioral annotations for a tool (from MCP spec).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAnnotations {
    /// Whether the tool only reads data.
    pub read_only_hint: Option<bool>,
    /// Whether the tool performs destructive operations.
    pub destructive_hint: Option<bool>,
    /// Whether repeated calls with same args produce same result.
    pub idempotent_hint: Option<bool>,
    /// Whether the tool interacts with external systems.
    pub open_world_hint: Option<bool>,
}

impl ToolAnnotations {
    /// Annotations for a read-only tool that talks to an external system.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read_only_hint: Some(true),
            destructive_hint: Some(false),
            idempotent_hint: Some(true),
            open_world_hint: Some(true),
        }
    }
}

/// A bounded-context empty outcome: zero matching rows, for a disclosed reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyOutcome {
    /// Why nothing was returned (e.g. `no_results`).
    pub reason: String,
}

/// Output from a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Human-readable content items.
    pub content: Vec<ContentItem>,
    /// Optional structured JSON output for programmatic consumption.
    pub structured_content: Option<serde_json::Value>,
    /// Whether this output represents an error.
    pub is_error: bool,
    /// Set when the tool deliberately returned nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty: Option<EmptyOutcome>,
}

impl ToolOutput {
    /// A successful text-only output.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text(text.into())],
            structured_content: None,
            is_error: false,
            empty: None,
        }
    }

    /// A successful output carrying structured JSON, mirrored as text.
    #[must_use]
    pub fn structured(value: serde_json::Value) -> Self {
        let text = match &value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            content: vec![ContentItem::Text(text)],
            structured_content: Some(value),
            is_error: false,
            empty: None,
        }
    }

    /// An error output with a message and optional structured detail.
    #[must_use]
    pub fn error(message: impl Into<String>, detail: Option<serde_json::Value>) -> Self {
        Self {
            content: vec![ContentItem::Text(message.into())],
            structured_content: detail,
            is_error: true,
            empty: None,
        }
    }

    /// An empty outcome with the given reason.
    #[must_use]
    pub fn empty(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            content: vec![ContentItem::Text(format!("no data returned: {reason}"))],
            structured_content: None,
            is_error: false,
            empty: Some(EmptyOutcome { reason }),
        }
    }

    /// Concatenate all text content items.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text(text) => Some(text.as_str()),
                ContentItem::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Authorization attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated principal, if known.
    pub principal: Option<String>,
    /// Granted scopes. `None` means the credentials are not scope-restricted.
    pub scopes: Option<BTreeSet<String>>,
}

impl AuthContext {
    /// Credentials that are not scope-restricted.
    #[must_use]
    pub fn unrestricted(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            scopes: None,
        }
    }

    /// Credentials restricted to the given scopes.
    #[must_use]
    pub fn scoped<I, S>(principal: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            principal: Some(principal.into()),
            scopes: Some(scopes.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether every scope in `required` is granted.
    #[must_use]
    pub fn grants_all(&self, required: &[String]) -> bool {
        match &self.scopes {
            None => true,
            Some(granted) => required.iter().all(|scope| granted.contains(scope)),
        }
    }
}

/// Runtime context provided to tools during execution.
///
/// Cloning is cheap; clones share the cancellation token.
#[derive(Clone)]
pub struct ToolContext {
    /// Identifier of the request this call belongs to.
    pub request_id: String,
    /// Caller authorization, forwarded unchanged to tools.
    pub auth: AuthContext,
    /// Token for cooperative cancellation.
    pub cancellation_token: CancellationToken,
    /// Optional progress reporter for long-running tools.
    pub progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl ToolContext {
    /// Create a context for a request with the given authorization.
    #[must_use]
    pub fn new(request_id: impl Into<String>, auth: AuthContext) -> Self {
        Self {
            request_id: request_id.into(),
            auth,
            cancellation_token: CancellationToken::new(),
            progress_reporter: None,
        }
    }
}

impl Default for ToolContext {
    /// Creates a ToolContext with an empty request id, unrestricted anonymous
    /// authorization, a fresh cancellation token and no progress reporter.
    fn default() -> Self {
        Self::new(String::new(), AuthContext::default())
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("request_id", &self.request_id)
            .field("auth", &self.auth)
            .field("cancelled", &self.cancellation_token.is_cancelled())
            .field("progress_reporter", &self.progress_reporter.is_some())
            .finish()
    }
}

/// Reports progress for long-running tool operations.
pub trait ProgressReporter: Send + Sync {
    /// Report progress.
    ///
    /// # Arguments
    /// * `progress` - Current progress value.
    /// * `total` - Optional total value (for percentage calculation).
    /// * `message` - Optional status message.
    fn report(&self, progress: f64, total: Option<f64>, message: Option<&str>);
}

/// One problem found while validating input against a JSON Schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Location of the offending value, e.g. `/query/fields/0/fieldCaption`.
    pub path: String,
    /// What is wrong at that location.
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}
