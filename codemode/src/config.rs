//! Configuration for code mode.

use std::time::Duration;

use codemode_sandbox::SandboxConfig;
use codemode_types::ConfigError;

/// Execution deadline in milliseconds.
pub const TIMEOUT_MS_ENV: &str = "CODE_MODE_TIMEOUT_MS";
/// Output budget per execution, in bytes.
pub const MAX_OUTPUT_BYTES_ENV: &str = "CODE_MODE_MAX_OUTPUT_BYTES";
/// Remote calls allowed per execution.
pub const MAX_API_CALLS_ENV: &str = "CODE_MODE_MAX_API_CALLS";
/// Script size limit, in bytes.
pub const MAX_SCRIPT_BYTES_ENV: &str = "CODE_MODE_MAX_SCRIPT_BYTES";
/// V8 heap limit, in bytes.
pub const MAX_HEAP_BYTES_ENV: &str = "CODE_MODE_MAX_HEAP_BYTES";

/// Default page size for `search-operations`.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Settings for [`CodeMode`](crate::CodeMode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeModeConfig {
    /// Limits applied to every sandbox execution.
    pub sandbox: SandboxConfig,
    /// Results returned by `search-operations` when the caller gives no limit.
    pub search_limit: usize,
}

impl Default for CodeModeConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl CodeModeConfig {
    /// Replace the sandbox limits.
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Set the default `search-operations` page size.
    #[must_use]
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Defaults overridden by any `CODE_MODE_*` variables that are set.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when a variable is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when a value is not a positive integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut sandbox = SandboxConfig::default();
        if let Some(ms) = read(&lookup, TIMEOUT_MS_ENV)? {
            sandbox.timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = read(&lookup, MAX_OUTPUT_BYTES_ENV)? {
            sandbox.max_output_bytes = to_usize(MAX_OUTPUT_BYTES_ENV, bytes)?;
        }
        if let Some(calls) = read(&lookup, MAX_API_CALLS_ENV)? {
            sandbox.max_api_calls = u32::try_from(calls).map_err(|_| ConfigError::Invalid {
                key: MAX_API_CALLS_ENV.to_string(),
                message: format!("{calls} is too large"),
            })?;
        }
        if let Some(bytes) = read(&lookup, MAX_SCRIPT_BYTES_ENV)? {
            sandbox.max_script_bytes = to_usize(MAX_SCRIPT_BYTES_ENV, bytes)?;
        }
        if let Some(bytes) = read(&lookup, MAX_HEAP_BYTES_ENV)? {
            sandbox.max_heap_bytes = to_usize(MAX_HEAP_BYTES_ENV, bytes)?;
        }
        Ok(Self::default().with_sandbox(sandbox))
    }
}

fn read(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: "must be greater than zero".into(),
        }),
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("'{raw}' is not a positive integer: {e}"),
        }),
    }
}

fn to_usize(key: &str, value: u64) -> Result<usize, ConfigError> {
    usize::try_from(value).map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        message: format!("{value} is too large"),
    })
}
