//! Script compilation and execution with captured diagnostics.
//!
//! Exceptions thrown by scripts never unwind into the host: every engine
//! call here runs under a catch scope and surfaces failures as typed errors.

use crate::runtime::error::{CompileError, HostError, RuntimeError};
use tracing::debug;

/// Compile `source` in the current context without running it.
///
/// Syntax errors are captured and returned as [`CompileError`] with the
/// one-based line and zero-based column reported by the engine.
pub fn compile<'s>(
    scope: &mut v8::HandleScope<'s>,
    source: &str,
) -> Result<v8::Local<'s, v8::Script>, HostError> {
    let code = v8::String::new(scope, source)
        .ok_or_else(|| HostError::Allocation("source text exceeds engine string limit".into()))?;

    let tc = &mut v8::TryCatch::new(scope);
    match v8::Script::compile(tc, code, None) {
        Some(script) => Ok(script),
        None => Err(compile_diagnostics(tc).into()),
    }
}

/// Run a previously compiled script and return its completion value.
///
/// A script may be run any number of times; each run re-executes it in the
/// entered context. Thrown exceptions and termination requests both surface
/// as [`RuntimeError`]; a termination that fired during the run is cancelled
/// before returning so the isolate stays usable.
pub fn run<'s>(
    scope: &mut v8::HandleScope<'s>,
    script: v8::Local<v8::Script>,
) -> Result<v8::Local<'s, v8::Value>, RuntimeError> {
    let tc = &mut v8::TryCatch::new(scope);
    match script.run(tc) {
        Some(value) => Ok(value),
        None => {
            let terminated = tc.has_terminated();
            let err = runtime_diagnostics(tc, terminated);
            if terminated {
                // Clear the request so the next run is not killed too.
                tc.thread_safe_handle().cancel_terminate_execution();
                debug!("script run terminated by request");
            }
            Err(err)
        }
    }
}

/// Compile and run `source` in one step.
pub fn eval<'s>(
    scope: &mut v8::HandleScope<'s>,
    source: &str,
) -> Result<v8::Local<'s, v8::Value>, HostError> {
    let script = compile(scope, source)?;
    run(scope, script).map_err(HostError::from)
}

fn compile_diagnostics(tc: &mut v8::TryCatch<v8::HandleScope>) -> CompileError {
    let message = tc
        .exception()
        .and_then(|exc| exc.to_string(tc))
        .map(|s| s.to_rust_string_lossy(tc))
        .unwrap_or_else(|| "compilation failed".to_string());
    let (line, column) = tc
        .message()
        .map(|m| {
            let line = m.get_line_number(tc).unwrap_or(0);
            let column = m.get_start_column();
            (line, column)
        })
        .unwrap_or((0, 0));
    CompileError { message, line, column }
}

fn runtime_diagnostics(tc: &mut v8::TryCatch<v8::HandleScope>, terminated: bool) -> RuntimeError {
    if terminated {
        return RuntimeError {
            message: "execution terminated".to_string(),
            stack: None,
            terminated: true,
        };
    }
    let message = tc
        .exception()
        .and_then(|exc| exc.to_string(tc))
        .map(|s| s.to_rust_string_lossy(tc))
        .unwrap_or_else(|| "unknown exception".to_string());
    let stack = tc
        .stack_trace()
        .and_then(|st| st.to_string(tc))
        .map(|s| s.to_rust_string_lossy(tc));
    RuntimeError {
        message,
        stack,
        terminated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::config::RuntimeConfig;
    use crate::runtime::context::ContextHandle;
    use crate::runtime::isolate::IsolateHost;
    use std::time::Duration;

    fn with_scope<R>(f: impl for<'s> FnOnce(&mut v8::HandleScope<'s>) -> R) -> R {
        let mut isolate = IsolateHost::new(&RuntimeConfig::default()).unwrap();
        let context = ContextHandle::open(&mut isolate);
        context.enter(&mut isolate, f)
    }

    #[test]
    fn test_string_concatenation() {
        with_scope(|scope| {
            let value = eval(scope, "'Hello' + ', World!'").unwrap();
            assert_eq!(value.to_rust_string_lossy(scope), "Hello, World!");
        });
    }

    #[test]
    fn test_compile_error_carries_location() {
        with_scope(|scope| {
            let err = match compile(scope, "let x = ;") {
                Err(HostError::Compile(err)) => err,
                other => panic!("expected compile error, got {other:?}"),
            };
            assert!(err.message.contains("SyntaxError"), "message: {}", err.message);
            assert_eq!(err.line, 1);
        });
    }

    #[test]
    fn test_runtime_error_carries_stack() {
        with_scope(|scope| {
            let source = "function boom() { throw new Error('kaput'); } boom();";
            let script = compile(scope, source).unwrap();
            let err = run(scope, script).unwrap_err();
            assert!(err.message.contains("kaput"), "message: {}", err.message);
            assert!(!err.terminated);
            let stack = err.stack.expect("stack trace");
            assert!(stack.contains("boom"), "stack: {stack}");
        });
    }

    #[test]
    fn test_run_twice_reexecutes() {
        with_scope(|scope| {
            eval(scope, "globalThis.n = 0;").unwrap();
            let script = compile(scope, "globalThis.n += 1; globalThis.n").unwrap();
            let first = run(scope, script).unwrap();
            assert_eq!(first.number_value(scope), Some(1.0));
            let second = run(scope, script).unwrap();
            assert_eq!(second.number_value(scope), Some(2.0));
        });
    }

    #[test]
    fn test_terminate_unwinds_infinite_loop() {
        let mut isolate = IsolateHost::new(&RuntimeConfig::default()).unwrap();
        let context = ContextHandle::open(&mut isolate);
        let handle = isolate.termination_handle();

        let killer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            handle.terminate_execution();
        });

        let err = context
            .enter(&mut isolate, |scope| eval(scope, "for (;;) {}").map(|_| ()))
            .unwrap_err();
        killer.join().unwrap();

        match err {
            HostError::Runtime(err) => assert!(err.terminated),
            other => panic!("expected runtime error, got {other:?}"),
        }

        // Termination is cancelled on unwind; the isolate stays usable.
        let value = context
            .enter(&mut isolate, |scope| {
                eval(scope, "1 + 1").map(|v| v.number_value(scope))
            })
            .unwrap();
        assert_eq!(value, Some(2.0));
    }
}
