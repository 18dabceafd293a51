use std::time::Duration;

/// Limits applied to every sandbox execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Wall-clock deadline for one execution.
    pub timeout: Duration,
    /// Default output budget (logs plus result), in serialized bytes.
    pub max_output_bytes: usize,
    /// Maximum remote calls one execution may make.
    pub max_api_calls: u32,
    /// Maximum script source size in bytes.
    pub max_script_bytes: usize,
    /// V8 heap limit in bytes.
    pub max_heap_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_output_bytes: 1024 * 1024,   // 1 MiB
            max_api_calls: 50,
            max_script_bytes: 64 * 1024,     // 64 KiB
            max_heap_bytes: 64 * 1024 * 1024, // 64 MiB
        }
    }
}

impl SandboxConfig {
    /// Set the execution deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default output budget.
    #[must_use]
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Set the per-execution call limit.
    #[must_use]
    pub fn with_max_api_calls(mut self, calls: u32) -> Self {
        self.max_api_calls = calls;
        self
    }

    /// Set the script size limit.
    #[must_use]
    pub fn with_max_script_bytes(mut self, bytes: usize) -> Self {
        self.max_script_bytes = bytes;
        self
    }

    /// Set the V8 heap limit.
    #[must_use]
    pub fn with_max_heap_bytes(mut self, bytes: usize) -> Self {
        self.max_heap_bytes = bytes;
        self
    }
}
