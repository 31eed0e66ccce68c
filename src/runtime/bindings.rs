//! Host function registry and the built-in bindings installed on every
//! context's global object.
//!
//! Callbacks run re-entrantly inside script execution; they report failures
//! by throwing script exceptions, never by unwinding into the engine.

use crate::runtime::error::HostError;
use crate::runtime::{js_value, strings, tasks};
use crate::JsValue;
use indexmap::IndexMap;
use tracing::info;

/// Named native functions to expose on a context's global object.
///
/// Registration order is preserved at install time. Registering a name twice
/// replaces the earlier callback; the last registration wins.
#[derive(Default)]
pub struct NativeRegistry {
    entries: IndexMap<String, v8::FunctionCallback>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` under `name`, replacing any earlier binding.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl v8::MapFnTo<v8::FunctionCallback>,
    ) -> &mut Self {
        self.entries.insert(name.into(), handler.map_fn_to());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Install every registered function on the current context's global
    /// object, in registration order.
    pub fn install(&self, scope: &mut v8::HandleScope) -> Result<(), HostError> {
        let global = scope.get_current_context().global(scope);
        for (name, callback) in &self.entries {
            let key = strings::new_string(scope, name)?;
            let function = v8::Function::builder_raw(*callback)
                .build(scope)
                .ok_or_else(|| {
                    HostError::Allocation(format!("cannot create function '{name}'"))
                })?;
            global.set(scope, key.into(), function.into());
        }
        Ok(())
    }
}

/// The bindings every fresh host starts with.
pub fn host_defaults() -> NativeRegistry {
    let mut registry = NativeRegistry::new();
    registry
        .register("ExecuteFile", execute_file)
        .register("TestString", test_string)
        .register("fetch", fetch);
    registry
}

pub(crate) fn throw_type_error(scope: &mut v8::HandleScope, message: &str) {
    let text =
        v8::String::new(scope, message).unwrap_or_else(|| v8::String::empty(scope));
    let exception = v8::Exception::type_error(scope, text);
    scope.throw_exception(exception);
}

pub(crate) fn throw_error(scope: &mut v8::HandleScope, message: &str) {
    let text =
        v8::String::new(scope, message).unwrap_or_else(|| v8::String::empty(scope));
    let exception = v8::Exception::error(scope, text);
    scope.throw_exception(exception);
}

/// Throw a TypeError and return false when fewer than `required` arguments
/// were passed.
pub(crate) fn require_args(
    scope: &mut v8::HandleScope,
    args: &v8::FunctionCallbackArguments,
    name: &str,
    required: usize,
) -> bool {
    let got = args.length() as usize;
    if got >= required {
        return true;
    }
    throw_type_error(
        scope,
        &format!("Failed to execute '{name}': expect {required} parameter, but only {got} presents."),
    );
    false
}

fn execute_file(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    // Argument validation only; the file is not executed yet.
    // TODO: evaluate the named file in the calling context.
    let _ = require_args(scope, &args, "ExecuteFile", 1);
}

fn test_string(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    if !require_args(scope, &args, "TestString", 1) {
        return;
    }

    let Some(subject) = args.get(0).to_string(scope) else {
        throw_type_error(
            scope,
            "Failed to execute 'TestString': the provided value cannot be converted to 'string'",
        );
        return;
    };

    let facts = strings::facts(scope, subject);
    let utf8 = strings::to_utf8(scope, subject);
    let utf16 = strings::to_utf16(scope, subject, 0, -1, strings::WriteOptions::default());
    let one_byte = strings::to_one_byte(scope, subject, 0, -1, strings::WriteOptions::default());

    info!(
        is_one_byte = facts.is_one_byte,
        contains_only_one_byte = facts.contains_only_one_byte,
        length = facts.length,
        utf8_length = facts.utf8_length,
        utf8 = %String::from_utf8_lossy(&utf8.bytes),
        utf16_written = utf16.written,
        one_byte_written = one_byte.written,
        one_byte_lossy = one_byte.lossy,
        "string diagnostics"
    );

    let mut report = IndexMap::new();
    report.insert("isOneByte".to_string(), JsValue::Bool(facts.is_one_byte));
    report.insert(
        "containsOnlyOneByte".to_string(),
        JsValue::Bool(facts.contains_only_one_byte),
    );
    report.insert("length".to_string(), JsValue::Number(facts.length as f64));
    report.insert(
        "utf8Length".to_string(),
        JsValue::Number(facts.utf8_length as f64),
    );
    report.insert(
        "utf8Written".to_string(),
        JsValue::Number(utf8.written as f64),
    );
    report.insert(
        "utf16Written".to_string(),
        JsValue::Number(utf16.written as f64),
    );
    report.insert(
        "oneByteWritten".to_string(),
        JsValue::Number(one_byte.written as f64),
    );
    report.insert("oneByteLossy".to_string(), JsValue::Bool(one_byte.lossy));

    match js_value::to_v8(scope, &JsValue::Object(report)) {
        Ok(value) => rv.set(value),
        Err(err) => throw_error(scope, &err.0),
    }
}

fn fetch(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    if !require_args(scope, &args, "fetch", 1) {
        return;
    }
    let Some(url) = args.get(0).to_string(scope) else {
        throw_type_error(
            scope,
            "Failed to execute 'fetch': the provided value cannot be converted to 'string'",
        );
        return;
    };
    let url = url.to_rust_string_lossy(scope);

    match tasks::begin_fetch(scope, url) {
        Ok(promise) => rv.set(promise.into()),
        Err(err) => throw_error(scope, &err.to_string()),
    }
}
