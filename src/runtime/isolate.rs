//! Isolate lifecycle: creation, statistics, cooperative termination,
//! microtask draining, disposal.
//!
//! One isolate is exclusively owned by one [`IsolateHost`]. Disposal is by
//! ownership (`dispose` consumes the host), so use-after-dispose cannot be
//! expressed. Entry from a thread other than the creating one is a
//! programming error and panics.

use crate::runtime::config::RuntimeConfig;
use crate::runtime::context::ContextHandle;
use crate::runtime::error::HostError;
use serde::Serialize;
use std::ffi::c_void;
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// Snapshot of the isolate's heap statistics. Never mutates engine state.
#[derive(Debug, Clone, Serialize)]
pub struct HeapStats {
    pub total_heap_size: usize,
    pub total_heap_size_executable: usize,
    pub total_physical_size: usize,
    pub used_heap_size: usize,
    pub heap_size_limit: usize,
    pub malloced_memory: usize,
    pub peak_malloced_memory: usize,
    pub external_memory: usize,
    pub used_global_handles_size: usize,
    pub total_global_handles_size: usize,
    pub number_of_native_contexts: usize,
    pub number_of_detached_contexts: usize,
}

/// Thread-safe handle for cooperative cancellation signals.
///
/// Termination aborts the running (or next-run) script at the engine's next
/// safe checkpoint; it never stops execution synchronously.
#[derive(Clone)]
pub struct TerminationHandle(v8::IsolateHandle);

impl TerminationHandle {
    /// Request that the current or next script execution unwind at the next
    /// termination checkpoint.
    pub fn terminate_execution(&self) -> bool {
        self.0.terminate_execution()
    }

    /// Clear a pending termination request. A no-op once the termination has
    /// already unwound the script.
    pub fn cancel_terminate(&self) -> bool {
        self.0.cancel_terminate_execution()
    }

    pub fn is_terminating(&self) -> bool {
        self.0.is_execution_terminating()
    }

    /// Schedule `callback` to run on the isolate thread at the next engine
    /// checkpoint. `data` must stay valid until the callback runs.
    pub fn request_interrupt(
        &self,
        callback: extern "C" fn(isolate: &mut v8::Isolate, data: *mut c_void),
        data: *mut c_void,
    ) -> bool {
        self.0.request_interrupt(callback, data)
    }
}

/// Exclusive owner of one isolated execution environment.
pub struct IsolateHost {
    isolate: v8::OwnedIsolate,
    owner: ThreadId,
}

impl IsolateHost {
    /// Allocate a fresh isolated heap.
    ///
    /// Fails with [`HostError::Allocation`] when the allocator configuration
    /// cannot be satisfied. Promise continuations are configured to run only
    /// at explicit microtask drains, never inline at resolve/reject.
    pub fn new(config: &RuntimeConfig) -> Result<Self, HostError> {
        crate::runtime::initialize_platform_once();
        config.validate().map_err(HostError::Allocation)?;

        let mut isolate = v8::Isolate::new(config.create_params());
        isolate.set_microtasks_policy(v8::MicrotasksPolicy::Explicit);
        debug!("isolate created");

        Ok(Self {
            isolate,
            owner: thread::current().id(),
        })
    }

    /// Snapshot of the current heap statistics; safe at any point while the
    /// isolate is live.
    pub fn stats(&mut self) -> HeapStats {
        self.assert_owner();
        let mut stats = v8::HeapStatistics::default();
        self.isolate.get_heap_statistics(&mut stats);
        HeapStats {
            total_heap_size: stats.total_heap_size(),
            total_heap_size_executable: stats.total_heap_size_executable(),
            total_physical_size: stats.total_physical_size(),
            used_heap_size: stats.used_heap_size(),
            heap_size_limit: stats.heap_size_limit(),
            malloced_memory: stats.malloced_memory(),
            peak_malloced_memory: stats.peak_malloced_memory(),
            external_memory: stats.external_memory(),
            used_global_handles_size: stats.used_global_handles_size(),
            total_global_handles_size: stats.total_global_handles_size(),
            number_of_native_contexts: stats.number_of_native_contexts(),
            number_of_detached_contexts: stats.number_of_detached_contexts(),
        }
    }

    pub fn termination_handle(&self) -> TerminationHandle {
        TerminationHandle(self.isolate.thread_safe_handle())
    }

    /// Drain queued microtasks (promise continuations) to completion.
    ///
    /// This is the sole suspension point at which script-visible
    /// continuations run; resolve/reject never invoke them inline. A
    /// continuation that throws is reported and cannot unwind into the host.
    pub fn run_microtasks(&mut self, context: &ContextHandle) {
        let platform = crate::runtime::platform();
        context.enter(self, |scope| {
            while v8::Platform::pump_message_loop(platform, scope, false) {}

            let tc = &mut v8::TryCatch::new(scope);
            tc.perform_microtask_checkpoint();
            if let Some(exception) = tc.exception() {
                let text = exception
                    .to_string(tc)
                    .map(|s| s.to_rust_string_lossy(tc))
                    .unwrap_or_else(|| "unknown exception".to_string());
                warn!(exception = %text, "exception during microtask drain");
            }
        });
    }

    /// Release the isolate. Consuming `self` makes a second dispose, or any
    /// use after dispose, unrepresentable.
    pub fn dispose(self) {
        self.assert_owner();
        debug!("isolate disposed");
    }

    pub(crate) fn raw(&mut self) -> &mut v8::OwnedIsolate {
        self.assert_owner();
        &mut self.isolate
    }

    pub(crate) fn raw_ref(&self) -> &v8::OwnedIsolate {
        self.assert_owner();
        &self.isolate
    }

    fn assert_owner(&self) {
        let current = thread::current().id();
        assert_eq!(
            current, self.owner,
            "isolate entered from thread {current:?} but is owned by {:?}",
            self.owner
        );
    }
}
