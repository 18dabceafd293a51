use std::collections::{BTreeMap, HashSet};

use codemode_types::{BoxedFuture, InvocationError, SandboxError};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::SandboxConfig;
use crate::protocol::{HostMessage, SandboxReport, WorkerMessage};
use crate::validator::validate_script;
use crate::worker::{self, WorkerChannels, WorkerSetup};

/// Executes operation calls on behalf of a running script.
///
/// Implementations resolve, validate and run the call; the sandbox only
/// routes it. Errors are handed to the script as rejections carrying
/// [`InvocationError::to_payload`].
pub trait InvokeHost: Send + Sync {
    /// Run one call.
    fn invoke<'a>(
        &'a self,
        operation_id: &'a str,
        args: Value,
    ) -> BoxedFuture<'a, Result<Value, InvocationError>>;
}

/// One script plus the capability surface it may use.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxRequest {
    /// A single function expression.
    pub code: String,
    /// Injected as the frozen `spec` global.
    pub spec: Value,
    /// operationId -> toolName. Its keys are the only ids the worker forwards.
    pub operation_map: BTreeMap<String, String>,
    /// Output budget for this execution; the executor's default when `None`.
    pub max_output_bytes: Option<usize>,
}

impl SandboxRequest {
    /// A request with the executor's default output budget.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        spec: Value,
        operation_map: BTreeMap<String, String>,
    ) -> Self {
        Self {
            code: code.into(),
            spec,
            operation_map,
            max_output_bytes: None,
        }
    }

    /// Override the output budget.
    #[must_use]
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = Some(bytes);
        self
    }
}

/// Runs scripts in fresh isolates, one worker thread per execution.
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor {
    config: SandboxConfig,
}

impl SandboxExecutor {
    /// Create an executor with the given limits.
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// The limits this executor applies.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `request` to completion, forwarding its calls to `host`.
    ///
    /// Calls run concurrently and are answered in completion order. On
    /// timeout or cancellation the isolate is terminated, in-flight calls
    /// are dropped, and the worker is abandoned.
    ///
    /// # Errors
    ///
    /// Any [`SandboxError`]; script-level failures arrive as
    /// [`SandboxError::Script`].
    pub async fn run(
        &self,
        request: SandboxRequest,
        host: &dyn InvokeHost,
        cancel: &CancellationToken,
    ) -> Result<SandboxReport, SandboxError> {
        let code = validate_script(&request.code, self.config.max_script_bytes)?.to_string();
        let spec_json = serde_json::to_string(&request.spec)
            .map_err(|e| SandboxError::fault(format!("spec could not be serialized: {e}")))?;
        let max_output_bytes = request
            .max_output_bytes
            .unwrap_or(self.config.max_output_bytes);

        let (to_host, mut from_worker) = mpsc::unbounded_channel();
        let (to_worker, from_host) = mpsc::unbounded_channel();
        let (isolate_tx, isolate_rx) = oneshot::channel();
        let setup = WorkerSetup {
            code,
            spec_json,
            allowed: request.operation_map.into_keys().collect(),
            max_output_bytes,
            max_api_calls: self.config.max_api_calls,
            max_heap_bytes: self.config.max_heap_bytes,
        };
        let channels = WorkerChannels {
            to_host,
            from_host,
            isolate: isolate_tx,
        };
        worker::spawn(setup, channels)
            .map_err(|e| SandboxError::fault(format!("failed to spawn sandbox worker: {e}")))?;
        let isolate = isolate_rx
            .await
            .map_err(|_| SandboxError::fault("sandbox worker exited before its isolate started"))?;

        tracing::debug!(
            timeout_ms = self.config.timeout.as_millis() as u64,
            max_output_bytes,
            "sandbox execution started"
        );

        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);
        let mut in_flight = FuturesUnordered::new();
        let mut outstanding = HashSet::new();

        let outcome = loop {
            tokio::select! {
                message = from_worker.recv() => match message {
                    Some(WorkerMessage::Invoke { id, operation_id, args }) => {
                        tracing::debug!(id, %operation_id, "script invoked operation");
                        outstanding.insert(id);
                        in_flight.push(async move {
                            let result = host.invoke(&operation_id, args).await;
                            (id, result)
                        });
                    }
                    Some(WorkerMessage::Complete(report)) => break Ok(report),
                    Some(WorkerMessage::Error { error }) => break Err(error),
                    None => {
                        break Err(SandboxError::fault("sandbox worker exited without reporting"));
                    }
                },
                Some((id, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    tracing::debug!(id, ok = result.is_ok(), "invocation settled");
                    if outstanding.remove(&id) {
                        // A closed channel means the worker already finished.
                        let _ = to_worker.send(HostMessage::invoke_result(id, result));
                    }
                }
                () = cancel.cancelled() => {
                    isolate.terminate_execution();
                    break Err(SandboxError::Cancelled);
                }
                () = &mut deadline => {
                    isolate.terminate_execution();
                    break Err(SandboxError::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    });
                }
            }
        };

        match &outcome {
            Ok(report) => tracing::info!(
                api_calls = report.api_calls,
                output_bytes = report.output_bytes,
                logs = report.logs.len(),
                "sandbox execution completed"
            ),
            Err(error) => tracing::warn!(
                kind = %error.kind(),
                abandoned_calls = in_flight.len(),
                error = %error,
                "sandbox execution failed"
            ),
        }
        outcome
    }
}
