//! Async bridge between native operations and script promises.
//!
//! A native binding calls [`invoke_async`] to mint a promise and a
//! [`CompletionHandle`]; the handle travels to whatever thread performs the
//! work and reports back exactly once over a channel. Settlement happens on
//! the isolate's owning thread when the host drains the channel and calls
//! [`deliver`]. Continuations queued by settlement stay parked until the
//! next explicit microtask drain.

use crate::runtime::error::HostError;
use crate::runtime::js_value;
use crate::runtime::transport::{FetchJob, FetchResponse};
use crate::JsValue;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Outcome of one async operation, keyed to its pending promise.
#[derive(Debug)]
pub struct Completion {
    pub id: u64,
    pub outcome: Result<FetchResponse, String>,
}

/// Single-use reporter for one async operation.
///
/// Exactly one of [`resolve`](Self::resolve) or [`reject`](Self::reject) can
/// ever be called; both consume the handle. Dropping an unused handle
/// reports a failure so the pending promise cannot leak.
#[derive(Debug)]
pub struct CompletionHandle(Option<(u64, UnboundedSender<Completion>)>);

impl CompletionHandle {
    pub fn resolve(mut self, response: FetchResponse) {
        self.send(Ok(response));
    }

    pub fn reject(mut self, reason: impl Into<String>) {
        self.send(Err(reason.into()));
    }

    fn send(&mut self, outcome: Result<FetchResponse, String>) {
        if let Some((id, tx)) = self.0.take() {
            // The receiver going away means the host is shutting down.
            let _ = tx.send(Completion { id, outcome });
        }
    }
}

#[cfg(test)]
pub(crate) fn test_handle(id: u64, tx: UnboundedSender<Completion>) -> CompletionHandle {
    CompletionHandle(Some((id, tx)))
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        self.send(Err("async operation dropped before completion".to_string()));
    }
}

/// Per-isolate bookkeeping for promises awaiting completion. Stored in an
/// isolate slot; only touched from the owning thread.
struct BridgeState {
    pending: HashMap<u64, v8::Global<v8::PromiseResolver>>,
    next_id: u64,
    completions: UnboundedSender<Completion>,
    jobs: UnboundedSender<FetchJob>,
}

type SharedBridge = Rc<RefCell<BridgeState>>;

pub(crate) fn install(
    isolate: &mut v8::Isolate,
    jobs: UnboundedSender<FetchJob>,
    completions: UnboundedSender<Completion>,
) {
    let state = BridgeState {
        pending: HashMap::new(),
        next_id: 1,
        completions,
        jobs,
    };
    isolate.set_slot::<SharedBridge>(Rc::new(RefCell::new(state)));
}

/// Number of promises still waiting for a completion.
pub(crate) fn pending_count(isolate: &v8::Isolate) -> usize {
    isolate
        .get_slot::<SharedBridge>()
        .map(|state| state.borrow().pending.len())
        .unwrap_or(0)
}

/// Mint a pending promise and hand its completion handle to `op`.
///
/// `op` runs synchronously; it typically ships the handle to another thread
/// and returns at once. The returned promise settles later, on this thread,
/// when the matching [`Completion`] is delivered.
pub fn invoke_async<'s>(
    scope: &mut v8::HandleScope<'s>,
    op: impl FnOnce(CompletionHandle),
) -> Result<v8::Local<'s, v8::Promise>, HostError> {
    let state = bridge(scope)?;
    let resolver = v8::PromiseResolver::new(scope)
        .ok_or_else(|| HostError::Allocation("cannot create promise resolver".into()))?;
    let promise = resolver.get_promise(scope);

    let handle = {
        let mut state = state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.pending.insert(id, v8::Global::new(scope, resolver));
        CompletionHandle(Some((id, state.completions.clone())))
    };

    op(handle);
    Ok(promise)
}

/// Queue an HTTP fetch on the transport thread and return the promise for
/// its eventual response.
pub(crate) fn begin_fetch<'s>(
    scope: &mut v8::HandleScope<'s>,
    url: String,
) -> Result<v8::Local<'s, v8::Promise>, HostError> {
    let jobs = bridge(scope)?.borrow().jobs.clone();
    invoke_async(scope, move |done| {
        if let Err(err) = jobs.send(FetchJob { url, done }) {
            err.0.done.reject("transport unavailable");
        }
    })
}

/// Settle the promise a completion belongs to. A completion whose promise is
/// already settled or unknown is logged and ignored, so settlement stays
/// exactly-once.
pub(crate) fn deliver(scope: &mut v8::HandleScope, completion: Completion) {
    let Ok(state) = bridge(scope) else {
        return;
    };
    let resolver = state.borrow_mut().pending.remove(&completion.id);
    let Some(resolver) = resolver else {
        warn!(id = completion.id, "completion for unknown async operation");
        return;
    };
    let resolver = v8::Local::new(scope, resolver);

    match completion.outcome {
        Ok(response) => {
            let mut fields = IndexMap::new();
            fields.insert("url".to_string(), JsValue::String(response.url));
            fields.insert(
                "status".to_string(),
                JsValue::Number(f64::from(response.status)),
            );
            fields.insert("body".to_string(), JsValue::String(response.body));
            match js_value::to_v8(scope, &JsValue::Object(fields)) {
                Ok(value) => {
                    resolver.resolve(scope, value);
                }
                Err(err) => {
                    reject_with(scope, resolver, &err.0);
                }
            }
        }
        Err(reason) => {
            reject_with(scope, resolver, &reason);
        }
    }
}

fn reject_with(
    scope: &mut v8::HandleScope,
    resolver: v8::Local<v8::PromiseResolver>,
    reason: &str,
) {
    let text = v8::String::new(scope, reason).unwrap_or_else(|| v8::String::empty(scope));
    let exception = v8::Exception::error(scope, text);
    resolver.reject(scope, exception);
}

fn bridge(scope: &mut v8::HandleScope) -> Result<SharedBridge, HostError> {
    scope
        .get_slot::<SharedBridge>()
        .cloned()
        .ok_or_else(|| HostError::Transport("async bridge not installed".into()))
}
