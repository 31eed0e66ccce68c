//! Tagged representation of JavaScript values crossing the host boundary.
//!
//! Unlike `serde_json::Value`, this enum distinguishes `undefined` from
//! `null`, represents NaN and ±Infinity, and its conversion from engine
//! values enforces depth/size limits and detects circular references instead
//! of overflowing the stack.

use crate::runtime::error::ValueError;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

/// Maximum nesting depth accepted when converting an engine value.
pub const MAX_VALUE_DEPTH: usize = 100;
/// Maximum accumulated size in bytes accepted when converting an engine value.
pub const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// One JavaScript value, materialized on the host side.
///
/// The `Serialize` implementation is manual because the `Function` variant
/// cannot be serialized.
#[derive(Clone, Debug, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    /// Any JS number, including NaN and ±Infinity.
    Number(f64),
    String(String),
    /// Preserves element order.
    Array(Vec<JsValue>),
    /// Uses IndexMap to preserve property insertion order.
    Object(IndexMap<String, JsValue>),
    /// A script function; only its name survives the boundary.
    Function { name: Option<String> },
}

impl Serialize for JsValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::Error;
        match self {
            JsValue::Undefined => serializer.serialize_unit(),
            JsValue::Null => serializer.serialize_none(),
            JsValue::Bool(b) => serializer.serialize_bool(*b),
            JsValue::Number(n) => {
                // Integral values within i64 range serialize without a
                // fractional part.
                if n.is_finite() && n.fract() == 0.0 && (*n as i64) as f64 == *n {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            JsValue::String(s) => serializer.serialize_str(s),
            JsValue::Array(arr) => arr.serialize(serializer),
            JsValue::Object(obj) => obj.serialize(serializer),
            JsValue::Function { name } => Err(Error::custom(format!(
                "cannot serialize function {:?}; functions must be called, not serialized",
                name.as_deref().unwrap_or("<anonymous>")
            ))),
        }
    }
}

/// Tracks depth and size limits during value conversion.
pub struct LimitTracker {
    max_depth: usize,
    max_bytes: usize,
    current_depth: usize,
    current_bytes: usize,
}

impl LimitTracker {
    pub fn new(max_depth: usize, max_bytes: usize) -> Self {
        Self {
            max_depth,
            max_bytes,
            current_depth: 0,
            current_bytes: 0,
        }
    }

    /// Enter a new depth level; errors once the depth limit is exceeded.
    pub fn enter(&mut self) -> Result<(), ValueError> {
        self.current_depth += 1;
        if self.current_depth > self.max_depth {
            return Err(ValueError(format!(
                "depth exceeded maximum limit of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    pub fn exit(&mut self) {
        self.current_depth = self.current_depth.saturating_sub(1);
    }

    /// Account for converted bytes; errors once the size limit is exceeded.
    pub fn add_bytes(&mut self, bytes: usize) -> Result<(), ValueError> {
        self.current_bytes += bytes;
        if self.current_bytes > self.max_bytes {
            return Err(ValueError(format!(
                "size ({} bytes) exceeded maximum limit of {} bytes",
                self.current_bytes, self.max_bytes
            )));
        }
        Ok(())
    }
}

/// Convert an engine value into a [`JsValue`] with cycle detection and
/// depth/size limits enforced. Never raises a script exception.
pub fn from_v8(
    scope: &mut v8::HandleScope,
    value: v8::Local<v8::Value>,
) -> Result<JsValue, ValueError> {
    let mut seen = HashSet::new();
    let mut tracker = LimitTracker::new(MAX_VALUE_DEPTH, MAX_VALUE_BYTES);
    convert(scope, value, &mut seen, &mut tracker)
}

fn convert(
    scope: &mut v8::HandleScope,
    value: v8::Local<v8::Value>,
    seen: &mut HashSet<i32>,
    tracker: &mut LimitTracker,
) -> Result<JsValue, ValueError> {
    tracker.enter()?;

    let result = if value.is_undefined() {
        Ok(JsValue::Undefined)
    } else if value.is_null() {
        Ok(JsValue::Null)
    } else if value.is_boolean() {
        Ok(JsValue::Bool(value.boolean_value(scope)))
    } else if value.is_number() {
        tracker.add_bytes(8)?;
        value
            .number_value(scope)
            .map(JsValue::Number)
            .ok_or_else(|| ValueError("failed to read numeric value".to_string()))
    } else if value.is_string() {
        let string = value
            .to_string(scope)
            .ok_or_else(|| ValueError("failed to read string value".to_string()))?;
        let text = string.to_rust_string_lossy(scope);
        tracker.add_bytes(text.len())?;
        Ok(JsValue::String(text))
    } else if value.is_function() {
        let func = v8::Local::<v8::Function>::try_from(value)
            .map_err(|_| ValueError("failed to cast to function".to_string()))?;
        let name = func.get_name(scope).to_rust_string_lossy(scope);
        Ok(JsValue::Function {
            name: (!name.is_empty()).then_some(name),
        })
    } else if value.is_array() {
        let obj = v8::Local::<v8::Object>::try_from(value)
            .map_err(|_| ValueError("failed to cast array to object".to_string()))?;
        let hash = obj.get_identity_hash().get();
        if !seen.insert(hash) {
            return Err(ValueError(
                "cannot convert circular reference".to_string(),
            ));
        }

        let array = v8::Local::<v8::Array>::try_from(value)
            .map_err(|_| ValueError("failed to cast to array".to_string()))?;
        let len = array.length();
        let mut items = Vec::with_capacity(len as usize);
        for i in 0..len {
            let item = array
                .get_index(scope, i)
                .ok_or_else(|| ValueError(format!("failed to get array index {i}")))?;
            items.push(convert(scope, item, seen, tracker)?);
        }

        seen.remove(&hash);
        Ok(JsValue::Array(items))
    } else if value.is_object() {
        let obj = v8::Local::<v8::Object>::try_from(value)
            .map_err(|_| ValueError("failed to cast to object".to_string()))?;
        let hash = obj.get_identity_hash().get();
        if !seen.insert(hash) {
            return Err(ValueError(
                "cannot convert circular reference".to_string(),
            ));
        }

        let prop_names = obj
            .get_own_property_names(scope, v8::GetPropertyNamesArgs::default())
            .ok_or_else(|| ValueError("failed to get property names".to_string()))?;

        let mut map = IndexMap::new();
        for i in 0..prop_names.length() {
            let key = prop_names
                .get_index(scope, i)
                .ok_or_else(|| ValueError("failed to get property name".to_string()))?;
            let key_str = key
                .to_string(scope)
                .ok_or_else(|| ValueError("failed to convert key to string".to_string()))?
                .to_rust_string_lossy(scope);
            let val = obj
                .get(scope, key)
                .ok_or_else(|| ValueError(format!("failed to get property '{key_str}'")))?;

            tracker.add_bytes(key_str.len())?;
            map.insert(key_str, convert(scope, val, seen, tracker)?);
        }

        seen.remove(&hash);
        Ok(JsValue::Object(map))
    } else {
        // Symbols and other exotic values fall back to their string form.
        let string = value
            .to_string(scope)
            .ok_or_else(|| ValueError("failed to convert value to string".to_string()))?;
        let text = string.to_rust_string_lossy(scope);
        tracker.add_bytes(text.len())?;
        Ok(JsValue::String(text))
    };

    tracker.exit();
    result
}

/// Materialize a [`JsValue`] as an engine value.
///
/// Functions cannot be materialized; the error is explicit rather than a
/// thrown script exception so the caller decides how to surface it.
pub fn to_v8<'s>(
    scope: &mut v8::HandleScope<'s>,
    value: &JsValue,
) -> Result<v8::Local<'s, v8::Value>, ValueError> {
    match value {
        JsValue::Undefined => Ok(v8::undefined(scope).into()),
        JsValue::Null => Ok(v8::null(scope).into()),
        JsValue::Bool(b) => Ok(v8::Boolean::new(scope, *b).into()),
        JsValue::Number(n) => Ok(v8::Number::new(scope, *n).into()),
        JsValue::String(s) => v8::String::new(scope, s)
            .map(Into::into)
            .ok_or_else(|| ValueError(format!("cannot allocate string of {} bytes", s.len()))),
        JsValue::Array(items) => {
            let array = v8::Array::new(scope, items.len() as i32);
            for (i, item) in items.iter().enumerate() {
                let element = to_v8(scope, item)?;
                array.set_index(scope, i as u32, element);
            }
            Ok(array.into())
        }
        JsValue::Object(map) => {
            let object = v8::Object::new(scope);
            for (key, val) in map {
                let key = v8::String::new(scope, key)
                    .ok_or_else(|| ValueError(format!("cannot allocate key '{key}'")))?;
                let val = to_v8(scope, val)?;
                object.set(scope, key.into(), val);
            }
            Ok(object.into())
        }
        JsValue::Function { .. } => Err(ValueError(
            "functions cannot be materialized into the engine".to_string(),
        )),
    }
}
