//! The ops the bootstrap script calls, and the per-execution state they
//! share through [`OpState`].

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use codemode_types::{ErrorKind, InvocationError, SandboxError};
use deno_core::{OpState, op2, v8};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{LogEntry, WorkerMessage};

deno_core::extension!(
    codemode_worker,
    ops = [
        op_codemode_invoke,
        op_codemode_log,
        op_codemode_set_result,
        op_codemode_fail,
    ],
);

/// What an invocation settles to on the JavaScript side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct InvokeResponse {
    pub ok: bool,
    pub value: Value,
    pub error: Value,
}

impl InvokeResponse {
    pub(crate) fn resolved(value: Value) -> Self {
        Self {
            ok: true,
            value,
            error: Value::Null,
        }
    }

    pub(crate) fn rejected(kind: ErrorKind, message: impl Into<String>, details: Value) -> Self {
        Self::rejected_with(json!({
            "kind": kind,
            "message": message.into(),
            "details": details,
        }))
    }

    pub(crate) fn rejected_with(payload: Value) -> Self {
        Self {
            ok: false,
            value: Value::Null,
            error: payload,
        }
    }
}

/// Invocations waiting for the host, keyed by id.
#[derive(Default)]
pub(crate) struct PendingCalls {
    calls: RefCell<HashMap<u64, oneshot::Sender<InvokeResponse>>>,
}

impl PendingCalls {
    fn insert(&self, id: u64, tx: oneshot::Sender<InvokeResponse>) {
        self.calls.borrow_mut().insert(id, tx);
    }

    fn remove(&self, id: u64) {
        self.calls.borrow_mut().remove(&id);
    }

    /// Settle `id`. Returns false when no such call is waiting.
    pub(crate) fn resolve(&self, id: u64, response: InvokeResponse) -> bool {
        match self.calls.borrow_mut().remove(&id) {
            Some(tx) => {
                // The receiver is gone only when the runtime is being torn down.
                let _ = tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Reject every waiting call with the same payload.
    pub(crate) fn reject_all(&self, kind: ErrorKind, message: &str) {
        let calls: Vec<_> = self.calls.borrow_mut().drain().collect();
        for (_, tx) in calls {
            let _ = tx.send(InvokeResponse::rejected(kind, message, Value::Null));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.borrow().len()
    }
}

/// The worker's side of the call channel.
pub(crate) struct WorkerBridge {
    pub next_id: u64,
    pub api_calls: u32,
    pub max_api_calls: u32,
    pub allowed: BTreeSet<String>,
    pub to_host: mpsc::UnboundedSender<WorkerMessage>,
    pub pending: Rc<PendingCalls>,
}

/// Bytes charged for logs and the result.
#[derive(Debug)]
pub(crate) struct OutputBudget {
    pub max: usize,
    pub used: usize,
    pub exceeded: bool,
}

impl OutputBudget {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            max,
            used: 0,
            exceeded: false,
        }
    }

    /// Charge `bytes`. Returns false once the budget is blown.
    fn charge(&mut self, bytes: usize) -> bool {
        self.used = self.used.saturating_add(bytes);
        if self.used > self.max {
            self.exceeded = true;
        }
        !self.exceeded
    }
}

#[derive(Debug, Default)]
pub(crate) struct LogBuffer(pub Vec<LogEntry>);

/// Set by the bootstrap once the script's promise settles.
#[derive(Debug, Default)]
pub(crate) struct ScriptOutcome {
    pub result: Option<Value>,
    pub failure: Option<SandboxError>,
}

/// Lets ops stop the isolate they run in.
pub(crate) struct Terminator(pub v8::IsolateHandle);

fn charge(state: &mut OpState, bytes: usize) -> bool {
    if state.borrow_mut::<OutputBudget>().charge(bytes) {
        return true;
    }
    tracing::debug!(bytes, "output budget exceeded; terminating isolate");
    state.borrow::<Terminator>().0.terminate_execution();
    false
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvokeRequest {
    operation_id: String,
    args_json: String,
}

#[op2(async)]
#[serde]
pub(crate) async fn op_codemode_invoke(
    state: Rc<RefCell<OpState>>,
    #[serde] request: InvokeRequest,
) -> InvokeResponse {
    let rx = {
        let mut state = state.borrow_mut();
        let budget = state.borrow::<OutputBudget>();
        if budget.exceeded {
            return InvokeResponse::rejected(
                ErrorKind::OutputExceeded,
                format!("output exceeded the {}-byte budget", budget.max),
                json!({ "limit": budget.max }),
            );
        }
        let bridge = state.borrow_mut::<WorkerBridge>();
        match dispatch(bridge, request) {
            Ok(rx) => rx,
            Err(rejection) => return rejection,
        }
    };
    rx.await.unwrap_or_else(|_| {
        InvokeResponse::rejected(
            ErrorKind::Cancelled,
            "the host abandoned this call",
            Value::Null,
        )
    })
}

fn dispatch(
    bridge: &mut WorkerBridge,
    request: InvokeRequest,
) -> Result<oneshot::Receiver<InvokeResponse>, InvokeResponse> {
    if !bridge.allowed.contains(&request.operation_id) {
        let error = InvocationError::UnknownOperation {
            operation_id: request.operation_id,
            suggestions: Vec::new(),
        };
        return Err(InvokeResponse::rejected_with(error.to_payload()));
    }
    if bridge.api_calls >= bridge.max_api_calls {
        return Err(InvokeResponse::rejected(
            ErrorKind::CallLimitExceeded,
            format!(
                "this execution already made {} calls; the limit is {}",
                bridge.api_calls, bridge.max_api_calls
            ),
            json!({ "limit": bridge.max_api_calls }),
        ));
    }
    let args: Value = serde_json::from_str(&request.args_json).map_err(|e| {
        InvokeResponse::rejected(
            ErrorKind::SandboxFault,
            format!("arguments could not be serialized: {e}"),
            Value::Null,
        )
    })?;

    bridge.api_calls += 1;
    bridge.next_id += 1;
    let id = bridge.next_id;
    let (tx, rx) = oneshot::channel();
    bridge.pending.insert(id, tx);
    let message = WorkerMessage::Invoke {
        id,
        operation_id: request.operation_id,
        args,
    };
    if bridge.to_host.send(message).is_err() {
        bridge.pending.remove(id);
        return Err(InvokeResponse::rejected(
            ErrorKind::Cancelled,
            "the host stopped accepting calls",
            Value::Null,
        ));
    }
    Ok(rx)
}

#[op2]
pub(crate) fn op_codemode_log(state: &mut OpState, #[serde] entry: LogEntry) -> bool {
    if !charge(state, entry.message.len()) {
        return false;
    }
    state.borrow_mut::<LogBuffer>().0.push(entry);
    true
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultPayload {
    json: String,
}

#[op2]
pub(crate) fn op_codemode_set_result(state: &mut OpState, #[serde] payload: ResultPayload) -> bool {
    if !charge(state, payload.json.len()) {
        return false;
    }
    let outcome = state.borrow_mut::<ScriptOutcome>();
    match serde_json::from_str(&payload.json) {
        Ok(value) => outcome.result = Some(value),
        Err(e) => {
            outcome.failure = Some(SandboxError::fault(format!("result is not valid JSON: {e}")));
        }
    }
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScriptFailure {
    message: String,
    stack: Option<String>,
    code: Option<String>,
    details_json: Option<String>,
}

impl ScriptFailure {
    fn into_error(self) -> SandboxError {
        let code = self
            .code
            .and_then(|code| serde_json::from_value(Value::String(code)).ok())
            .unwrap_or(ErrorKind::SandboxFault);
        let details = self
            .details_json
            .and_then(|json| serde_json::from_str(&json).ok());
        SandboxError::Script {
            code,
            message: self.message,
            stack: self.stack,
            details,
        }
    }
}

#[op2]
pub(crate) fn op_codemode_fail(state: &mut OpState, #[serde] failure: ScriptFailure) {
    let outcome = state.borrow_mut::<ScriptOutcome>();
    if outcome.failure.is_none() {
        outcome.failure = Some(failure.into_error());
    }
}
