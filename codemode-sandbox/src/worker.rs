//! The worker thread: one isolate, one current-thread runtime, one script.

use std::collections::BTreeSet;
use std::ffi::c_void;
use std::rc::Rc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use codemode_types::{ErrorKind, SandboxError};
use deno_core::{JsRuntime, PollEventLoopOptions, RuntimeOptions, v8};
use tokio::sync::{mpsc, oneshot};

use crate::ops::{
    InvokeResponse, LogBuffer, OutputBudget, PendingCalls, ScriptOutcome, Terminator,
    WorkerBridge, codemode_worker,
};
use crate::protocol::{HostMessage, SandboxReport, WorkerMessage};

const BOOTSTRAP_JS: &str = include_str!("js/bootstrap.js");

/// Extra headroom granted once the isolate nears its heap limit, so that
/// termination can unwind.
const HEAP_GRACE_BYTES: usize = 1024 * 1024;

static V8_FLAGS: Once = Once::new();

/// Everything the worker needs, moved onto its thread.
pub(crate) struct WorkerSetup {
    pub code: String,
    pub spec_json: String,
    pub allowed: BTreeSet<String>,
    pub max_output_bytes: usize,
    pub max_api_calls: u32,
    pub max_heap_bytes: usize,
}

/// Channels connecting a worker to its host.
pub(crate) struct WorkerChannels {
    pub to_host: mpsc::UnboundedSender<WorkerMessage>,
    pub from_host: mpsc::UnboundedReceiver<HostMessage>,
    pub isolate: oneshot::Sender<v8::IsolateHandle>,
}

/// Start a worker thread. It reports exactly one `Complete` or `Error`
/// unless the host has already gone away.
pub(crate) fn spawn(
    setup: WorkerSetup,
    channels: WorkerChannels,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("codemode-worker".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let error = SandboxError::fault(format!("failed to start worker runtime: {e}"));
                    let _ = channels.to_host.send(WorkerMessage::Error { error });
                    return;
                }
            };
            let to_host = channels.to_host.clone();
            let message = match rt.block_on(execute(setup, channels)) {
                Ok(report) => WorkerMessage::Complete(report),
                Err(error) => WorkerMessage::Error { error },
            };
            if to_host.send(message).is_err() {
                tracing::debug!("host stopped listening before the worker finished");
            }
        })
}

/// Apply isolate-wide hardening flags once per process, before the first
/// isolate exists.
fn init_v8_flags() {
    V8_FLAGS.call_once(|| {
        let unrecognized = deno_core::v8_set_flags(vec![
            String::new(),
            "--disallow-code-generation-from-strings".into(),
            "--noexpose-wasm".into(),
        ]);
        // The first entry is the program name slot.
        if unrecognized.len() > 1 {
            tracing::warn!(flags = ?&unrecognized[1..], "V8 ignored sandbox flags");
        }
    });
}

struct HeapLimitState {
    handle: v8::IsolateHandle,
    triggered: AtomicBool,
}

extern "C" fn near_heap_limit_callback(
    data: *mut c_void,
    current_heap_limit: usize,
    _initial_heap_limit: usize,
) -> usize {
    // SAFETY: `data` points at the `HeapLimitState` boxed in `execute`, which
    // outlives the runtime the callback is registered on.
    let state = unsafe { &*(data as *const HeapLimitState) };
    if !state.triggered.swap(true, Ordering::SeqCst) {
        state.handle.terminate_execution();
    }
    current_heap_limit + HEAP_GRACE_BYTES
}

async fn execute(
    setup: WorkerSetup,
    channels: WorkerChannels,
) -> Result<SandboxReport, SandboxError> {
    init_v8_flags();
    let mut runtime = JsRuntime::new(RuntimeOptions {
        extensions: vec![codemode_worker::init()],
        create_params: Some(v8::CreateParams::default().heap_limits(0, setup.max_heap_bytes)),
        ..Default::default()
    });

    let handle = runtime.v8_isolate().thread_safe_handle();
    if channels.isolate.send(handle.clone()).is_err() {
        return Err(SandboxError::Cancelled);
    }

    let heap = Box::new(HeapLimitState {
        handle: handle.clone(),
        triggered: AtomicBool::new(false),
    });
    runtime.v8_isolate().add_near_heap_limit_callback(
        near_heap_limit_callback,
        &*heap as *const HeapLimitState as *mut c_void,
    );

    let result = drive(
        &mut runtime,
        &heap,
        setup,
        channels.to_host,
        channels.from_host,
        handle,
    )
    .await;
    // The callback data must outlive the isolate.
    drop(runtime);
    drop(heap);
    result
}

async fn drive(
    runtime: &mut JsRuntime,
    heap: &HeapLimitState,
    setup: WorkerSetup,
    to_host: mpsc::UnboundedSender<WorkerMessage>,
    from_host: mpsc::UnboundedReceiver<HostMessage>,
    handle: v8::IsolateHandle,
) -> Result<SandboxReport, SandboxError> {
    let pending = Rc::new(PendingCalls::default());
    {
        let op_state = runtime.op_state();
        let mut op_state = op_state.borrow_mut();
        op_state.put(WorkerBridge {
            next_id: 0,
            api_calls: 0,
            max_api_calls: setup.max_api_calls,
            allowed: setup.allowed,
            to_host,
            pending: pending.clone(),
        });
        op_state.put(OutputBudget::new(setup.max_output_bytes));
        op_state.put(LogBuffer::default());
        op_state.put(ScriptOutcome::default());
        op_state.put(Terminator(handle));
    }

    let spec_literal = serde_json::to_string(&setup.spec_json)
        .map_err(|e| SandboxError::fault(format!("spec could not be encoded: {e}")))?;
    runtime
        .execute_script(
            "[codemode:bootstrap]",
            format!("({BOOTSTRAP_JS})(Deno.core.ops, {spec_literal});"),
        )
        .map_err(|e| SandboxError::fault(format!("sandbox bootstrap failed: {e}")))?;

    let script = runtime.execute_script("[codemode:script]", wrap_script(&setup.code));
    let settled = match script {
        Ok(_) => {
            tokio::select! {
                result = runtime.run_event_loop(PollEventLoopOptions::default()) => {
                    result.map_err(|e| e.to_string())
                }
                () = route_results(from_host, pending.clone()) => {
                    return Err(SandboxError::Cancelled);
                }
            }
        }
        Err(e) => Err(e.to_string()),
    };
    pending.reject_all(ErrorKind::SandboxFault, "the script finished while this call was pending");

    let op_state = runtime.op_state();
    let mut op_state = op_state.borrow_mut();
    let (exceeded, limit, output_bytes) = {
        let budget = op_state.borrow::<OutputBudget>();
        (budget.exceeded, budget.max, budget.used)
    };
    if exceeded {
        return Err(SandboxError::OutputExceeded { limit });
    }
    if heap.triggered.load(Ordering::SeqCst) {
        return Err(SandboxError::HeapLimitExceeded);
    }
    let outcome = op_state.take::<ScriptOutcome>();
    if let Some(failure) = outcome.failure {
        return Err(failure);
    }
    if let Err(message) = settled {
        return Err(SandboxError::fault(message));
    }
    let Some(result) = outcome.result else {
        return Err(SandboxError::fault(
            "script finished without settling its promise",
        ));
    };
    let logs = op_state.take::<LogBuffer>().0;
    let api_calls = op_state.borrow::<WorkerBridge>().api_calls;
    Ok(SandboxReport {
        result,
        logs,
        api_calls,
        output_bytes,
    })
}

/// Hand the script to the bootstrap's hidden runner, removing the runner
/// before any user code is evaluated. `code` must already be a single
/// parsed function expression.
fn wrap_script(code: &str) -> String {
    format!(
        "(() => {{ const run = globalThis.__codemodeRun; delete globalThis.__codemodeRun; run(() => (\n{code}\n)); }})();"
    )
}

/// Settle pending calls as the host answers them. Returns only once the host
/// has hung up, after rejecting whatever is still pending.
async fn route_results(
    mut from_host: mpsc::UnboundedReceiver<HostMessage>,
    pending: Rc<PendingCalls>,
) {
    while let Some(message) = from_host.recv().await {
        let HostMessage::InvokeResult { id, ok, value, error } = message;
        let response = if ok {
            InvokeResponse::resolved(value.unwrap_or_default())
        } else {
            InvokeResponse::rejected_with(error.unwrap_or_default())
        };
        if !pending.resolve(id, response) {
            tracing::warn!(id, "dropping result for an invocation that is not pending");
        }
    }
    tracing::debug!(pending = pending.len(), "host hung up; rejecting pending calls");
    pending.reject_all(ErrorKind::Cancelled, "the host abandoned this execution");
}
