//! Embedding host for a sandboxed JavaScript engine.
//!
//! Each [`ScriptHost`] owns a single V8 isolate on its creating thread,
//! installs host natives into one execution context, and bridges host-side
//! asynchronous completions back into script promises through an
//! owning-thread completion queue.

pub mod bindings;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod isolate;
pub mod js_value;
pub mod script;
pub mod strings;
pub mod tasks;
pub mod transport;

use once_cell::sync::OnceCell;

/// Global V8 platform instance.
///
/// V8 requires exactly one platform to be initialized before creating
/// isolates. Initialized once on first access and never torn down while the
/// process lives.
static V8_PLATFORM: OnceCell<v8::SharedRef<v8::Platform>> = OnceCell::new();

/// Initialize the V8 platform exactly once.
///
/// Safe to call multiple times; subsequent calls are no-ops. Must run before
/// any isolate is created.
pub fn initialize_platform_once() {
    V8_PLATFORM.get_or_init(|| {
        let platform = v8::new_default_platform(0, false).make_shared();
        v8::V8::initialize_platform(platform.clone());
        v8::V8::initialize();
        platform
    });
}

/// Check if the V8 platform has been initialized.
pub fn is_platform_initialized() -> bool {
    V8_PLATFORM.get().is_some()
}

/// Shared platform reference, used to pump the engine's message loop.
pub(crate) fn platform() -> &'static v8::SharedRef<v8::Platform> {
    V8_PLATFORM
        .get()
        .expect("V8 platform not initialized; call initialize_platform_once first")
}

pub use bindings::NativeRegistry;
pub use config::RuntimeConfig;
pub use context::ContextHandle;
pub use error::{CompileError, HostError, RuntimeError, ValueError};
pub use host::ScriptHost;
pub use isolate::{HeapStats, IsolateHost, TerminationHandle};
pub use js_value::JsValue;
pub use transport::FetchResponse;
