//! Execution contexts: independent global scopes sharing one isolate heap.

use crate::runtime::isolate::IsolateHost;

/// Handle to one global scope inside an isolate.
///
/// Multiple contexts can coexist in the same isolate; each has its own
/// global object, so state written in one is invisible to the others.
/// Dropping the handle releases the context; dropping it is only safe while
/// the owning isolate is still live, which the field order in
/// [`crate::runtime::host::ScriptHost`] guarantees.
pub struct ContextHandle {
    context: v8::Global<v8::Context>,
}

impl ContextHandle {
    /// Create a fresh context with its own global object.
    pub fn open(host: &mut IsolateHost) -> Self {
        let isolate = host.raw();
        let scope = &mut v8::HandleScope::new(isolate);
        let context = v8::Context::new(scope, v8::ContextOptions::default());
        let context = v8::Global::new(scope, context);
        Self { context }
    }

    /// Enter the context and run `f` with a scope rooted in it.
    ///
    /// All script evaluation and value marshaling happens inside such a
    /// closure; local handles created by `f` die when it returns.
    pub fn enter<R>(
        &self,
        host: &mut IsolateHost,
        f: impl for<'s> FnOnce(&mut v8::HandleScope<'s>) -> R,
    ) -> R {
        let scope = &mut v8::HandleScope::with_context(host.raw(), &self.context);
        f(scope)
    }

    /// The context's global object, for installing host bindings on it.
    pub fn global<'s>(&self, scope: &mut v8::HandleScope<'s>) -> v8::Local<'s, v8::Object> {
        let local = v8::Local::new(scope, &self.context);
        local.global(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::config::RuntimeConfig;
    use crate::runtime::script;

    #[test]
    fn test_contexts_have_independent_globals() {
        let mut isolate = IsolateHost::new(&RuntimeConfig::default()).unwrap();
        let first = ContextHandle::open(&mut isolate);
        let second = ContextHandle::open(&mut isolate);

        first
            .enter(&mut isolate, |scope| {
                script::eval(scope, "globalThis.tag = 'first';").map(|_| ())
            })
            .unwrap();

        let seen = second
            .enter(&mut isolate, |scope| {
                script::eval(scope, "typeof globalThis.tag")
                    .map(|v| v.to_rust_string_lossy(scope))
            })
            .unwrap();
        assert_eq!(seen, "undefined");

        let kept = first
            .enter(&mut isolate, |scope| {
                script::eval(scope, "globalThis.tag").map(|v| v.to_rust_string_lossy(scope))
            })
            .unwrap();
        assert_eq!(kept, "first");
    }
}
