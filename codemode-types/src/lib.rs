//! Shared types for the code-mode sandbox.
//!
//! - [`ToolDefinition`], [`ToolOutput`], [`ToolContext`], [`AuthContext`]:
//!   what the tool registry stores, returns, and forwards to tools.
//! - [`Tool`] / [`ToolDyn`]: strongly-typed tools and their type-erased form.
//! - [`ToolError`], [`InvocationError`], [`SandboxError`], [`ErrorKind`]:
//!   one error enum per boundary, plus the taxonomy scripts see.

#![deny(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
