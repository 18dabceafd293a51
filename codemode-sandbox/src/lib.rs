//! V8 sandbox for code-mode scripts.
//!
//! Each [`SandboxExecutor::run`] starts a fresh isolate on a dedicated
//! worker thread. The script sees three frozen globals:
//!
//! - `spec`: the capability catalog, as passed in the request.
//! - `tableau`: `listOperations()`, `callTool(id, args)` and
//!   `operations[id](args)`. Every call is forwarded to the host's
//!   [`InvokeHost`] and resolves or rejects with the host's answer.
//! - `console`: `log`, `info`, `warn`, `error` and `debug`, captured into
//!   [`SandboxReport::logs`].
//!
//! `eval`, the function constructors and WebAssembly are unavailable.
//! Output, call count, heap and wall-clock time are all bounded by
//! [`SandboxConfig`].

mod config;
mod host;
mod ops;
pub mod protocol;
mod validator;
mod worker;

pub use config::SandboxConfig;
pub use host::{InvokeHost, SandboxExecutor, SandboxRequest};
pub use protocol::{LogEntry, LogLevel, SandboxReport};
pub use validator::validate_script;
