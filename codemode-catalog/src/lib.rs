#![deny(missing_docs)]
//! Capability catalog for code-mode scripts.
//!
//! [`CapabilityCatalog::build`] turns the tools enabled for a caller into
//! [`Operation`]s keyed by a stable camelCase id, attaches alias tables and
//! examples where agents tend to stumble, and produces the [`CodeModeSpec`]
//! injected into the sandbox.

mod catalog;
pub mod hints;
pub mod naming;
mod operation;
mod spec;

pub use catalog::CapabilityCatalog;
pub use naming::operation_id;
pub use operation::{Operation, OperationAnnotations, OperationExample};
pub use spec::CodeModeSpec;
