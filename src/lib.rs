//! Embedding host for a sandboxed script engine.
//!
//! The crate wraps isolate and context lifecycle, script compilation and
//! execution with captured diagnostics, an encoding bridge for engine
//! strings, a registry of native host functions, and an async bridge that
//! settles script promises from work done on other threads.
//!
//! ```no_run
//! use balus::{NativeRegistry, RuntimeConfig, ScriptHost};
//!
//! # fn main() -> Result<(), balus::HostError> {
//! let mut host = ScriptHost::new(RuntimeConfig::default())?;
//! host.install(&balus::runtime::bindings::host_defaults())?;
//! let value = host.eval("'Hello' + ', World!'")?;
//! println!("{value:?}");
//! host.run_event_loop();
//! host.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod fs;
pub mod runtime;

pub use runtime::{
    initialize_platform_once, HostError, JsValue, NativeRegistry, RuntimeConfig, ScriptHost,
};
