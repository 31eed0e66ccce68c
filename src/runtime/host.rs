//! The embedding host: one isolate, one context, native bindings, and the
//! async bridge, behind a single owner type.

use crate::runtime::bindings::NativeRegistry;
use crate::runtime::config::RuntimeConfig;
use crate::runtime::context::ContextHandle;
use crate::runtime::error::HostError;
use crate::runtime::isolate::{HeapStats, IsolateHost, TerminationHandle};
use crate::runtime::transport::TransportHandle;
use crate::runtime::{js_value, script, tasks, transport};
use crate::JsValue;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::debug;

/// Owner of one script execution environment.
///
/// All methods must run on the thread that created the host. Field order is
/// load-bearing: the context handle must drop before the isolate, and the
/// transport before the completion receiver closes.
pub struct ScriptHost {
    transport: TransportHandle,
    completions: UnboundedReceiver<tasks::Completion>,
    context: ContextHandle,
    isolate: IsolateHost,
}

impl ScriptHost {
    /// Build a host: isolate, context, transport thread, async bridge, and
    /// the optional bootstrap script from `config`.
    pub fn new(config: RuntimeConfig) -> Result<Self, HostError> {
        let mut isolate = IsolateHost::new(&config)?;
        let context = ContextHandle::open(&mut isolate);
        let transport = transport::spawn()?;
        let (completions_tx, completions) = mpsc::unbounded_channel();
        tasks::install(isolate.raw(), transport.sender(), completions_tx);

        let mut host = Self {
            transport,
            completions,
            context,
            isolate,
        };
        if let Some(bootstrap) = config.bootstrap_script {
            debug!("running bootstrap script");
            host.eval(&bootstrap)?;
        }
        Ok(host)
    }

    /// Install native functions on the context's global object.
    pub fn install(&mut self, registry: &NativeRegistry) -> Result<(), HostError> {
        self.context
            .enter(&mut self.isolate, |scope| registry.install(scope))
    }

    /// Compile and run `source`, marshaling the completion value out.
    pub fn eval(&mut self, source: &str) -> Result<JsValue, HostError> {
        self.context.enter(&mut self.isolate, |scope| {
            let value = script::eval(scope, source)?;
            js_value::from_v8(scope, value).map_err(HostError::from)
        })
    }

    /// Deliver every completion that has already arrived, then drain
    /// microtasks once. Never blocks.
    pub fn pump(&mut self) {
        let mut delivered = false;
        while let Ok(completion) = self.completions.try_recv() {
            self.context.enter(&mut self.isolate, |scope| {
                tasks::deliver(scope, completion);
            });
            delivered = true;
        }
        if delivered {
            self.isolate.run_microtasks(&self.context);
        }
    }

    /// Block until every pending async operation has settled and its
    /// continuations have run.
    pub fn run_event_loop(&mut self) {
        self.pump();
        while self.pending_async_ops() > 0 {
            let Some(completion) = self.completions.blocking_recv() else {
                break;
            };
            self.context.enter(&mut self.isolate, |scope| {
                tasks::deliver(scope, completion);
            });
            // Batch anything else that arrived in the meantime.
            while let Ok(completion) = self.completions.try_recv() {
                self.context.enter(&mut self.isolate, |scope| {
                    tasks::deliver(scope, completion);
                });
            }
            self.isolate.run_microtasks(&self.context);
        }
    }

    /// Promises minted by native bindings that have not settled yet.
    pub fn pending_async_ops(&self) -> usize {
        tasks::pending_count(self.isolate.raw_ref())
    }

    pub fn stats(&mut self) -> HeapStats {
        self.isolate.stats()
    }

    pub fn termination_handle(&self) -> TerminationHandle {
        self.isolate.termination_handle()
    }

    /// Tear the host down in dependency order.
    pub fn shutdown(self) {
        let Self {
            mut transport,
            completions,
            context,
            isolate,
        } = self;
        transport.shutdown();
        drop(completions);
        drop(context);
        isolate.dispose();
    }
}
