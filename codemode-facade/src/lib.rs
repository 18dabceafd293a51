//! Invocation facade for code-mode scripts.
//!
//! Every call a script makes goes through [`InvocationFacade::invoke`]:
//!
//! 1. resolve the operation id against the [`CapabilityCatalog`](codemode_catalog::CapabilityCatalog),
//! 2. rewrite alias keys and query shorthand ([`normalize`]),
//! 3. validate against the tool's real schema, failing with prescriptive
//!    [`InvalidArguments`](codemode_types::InvalidArguments),
//! 4. execute through the registry with the caller's own context,
//! 5. unwrap, normalize empty outcomes and truncate list results
//!    ([`postprocess`]).

mod facade;
pub mod normalize;
pub mod postprocess;

pub use facade::{InvocationFacade, PreparedCall};
