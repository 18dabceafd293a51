//! Code mode for a tool registry.
//!
//! Instead of one tool call per step, an agent submits a single JavaScript
//! function through the `execute-code` meta-tool. The script runs in a V8
//! sandbox and reaches the registry's tools as `tableau.operations[id]`,
//! each call passing through alias/shorthand normalization, schema
//! validation and result post-processing. Only the returned value and the
//! captured console output travel back to the agent.
//!
//! ```ignore
//! let registry = CodeMode::install(registry, CodeModeConfig::from_env()?);
//! let output = registry
//!     .execute("execute-code", json!({"code": "async () => tableau.listOperations()"}), &ctx)
//!     .await?;
//! ```

mod code_mode;
pub mod config;
mod meta;

pub use code_mode::CodeMode;
pub use config::CodeModeConfig;
pub use meta::{ExecuteCodeTool, SearchOperationsArgs, SearchOperationsOutput, SearchOperationsTool};

pub use codemode_catalog::{CapabilityCatalog, CodeModeSpec, Operation};
pub use codemode_facade::InvocationFacade;
pub use codemode_sandbox::{LogEntry, LogLevel, SandboxConfig, SandboxExecutor, SandboxReport};
pub use codemode_tool::ToolRegistry;
pub use codemode_types::*;
