//! Tool registry for the code-mode sandbox.
//!
//! [`ToolRegistry`] stores type-erased tools, decides per request which of
//! them are enabled (include/exclude [`ToolFilter`] plus the caller's
//! scopes), and runs calls through a [`ToolMiddleware`] pipeline.
//! [`schema::validate`] is the issue-collecting JSON Schema check shared by
//! [`SchemaValidator`] and the invocation facade.

pub mod builtin;
pub mod filter;
pub mod middleware;
pub mod registry;
pub mod schema;

pub use builtin::*;
pub use filter::*;
pub use middleware::*;
pub use registry::*;
