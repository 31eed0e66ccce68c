//! Encoding bridge between host strings and engine strings.
//!
//! The engine stores strings either as one-byte (Latin-1) or two-byte
//! (UTF-16) sequences; callers that need byte-exact forms (logging, network
//! serialization) get explicit conversion paths for both, plus UTF-8.

use crate::runtime::error::HostError;

/// Options for the UTF-16 and one-byte write paths.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Replace invalid UTF-8 sequences with a placeholder unit.
    pub replace_invalid_utf8: bool,
    /// Append a terminating zero unit after the written data.
    pub null_terminate: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            replace_invalid_utf8: true,
            null_terminate: false,
        }
    }
}

impl WriteOptions {
    fn flags(self) -> v8::WriteOptions {
        let mut flags = v8::WriteOptions::NO_OPTIONS;
        if self.replace_invalid_utf8 {
            flags |= v8::WriteOptions::REPLACE_INVALID_UTF8;
        }
        if !self.null_terminate {
            flags |= v8::WriteOptions::NO_NULL_TERMINATION;
        }
        flags
    }
}

/// A string rendered as UTF-8 bytes. `written == bytes.len()` always; the
/// engine's conversion is symmetric, so `written` equals the string's UTF-8
/// length.
#[derive(Debug, Clone)]
pub struct Utf8View {
    pub bytes: Vec<u8>,
    pub written: usize,
    /// Number of characters consumed from the source string.
    pub chars: usize,
}

/// A string rendered as UTF-16 code units. `written` may be less than the
/// requested length near the end of the string.
#[derive(Debug, Clone)]
pub struct Utf16View {
    pub units: Vec<u16>,
    pub written: usize,
}

/// A string rendered by truncating each UTF-16 unit to its low byte.
///
/// When the source contains characters outside one-byte range, `lossy` is
/// set: the data loss is flagged, never silently repaired.
#[derive(Debug, Clone)]
pub struct OneByteView {
    pub bytes: Vec<u8>,
    pub written: usize,
    pub lossy: bool,
}

/// Representation facts about one engine string.
#[derive(Debug, Clone, Copy)]
pub struct StringFacts {
    /// Whether the engine stores this string in its one-byte representation.
    pub is_one_byte: bool,
    /// Whether every character fits in one byte regardless of storage.
    pub contains_only_one_byte: bool,
    /// Length in UTF-16 code units.
    pub length: usize,
    /// Length of the UTF-8 rendering in bytes.
    pub utf8_length: usize,
}

/// Allocate an engine string from host UTF-8 text.
pub fn new_string<'s>(
    scope: &mut v8::HandleScope<'s>,
    text: &str,
) -> Result<v8::Local<'s, v8::String>, HostError> {
    v8::String::new(scope, text).ok_or_else(|| {
        HostError::Encoding(format!(
            "cannot allocate engine string of {} bytes",
            text.len()
        ))
    })
}

/// Allocate an engine string from raw UTF-8 bytes.
pub fn from_utf8<'s>(
    scope: &mut v8::HandleScope<'s>,
    bytes: &[u8],
) -> Result<v8::Local<'s, v8::String>, HostError> {
    v8::String::new_from_utf8(scope, bytes, v8::NewStringType::Normal).ok_or_else(|| {
        HostError::Encoding(format!(
            "cannot allocate engine string of {} bytes",
            bytes.len()
        ))
    })
}

pub fn facts(scope: &mut v8::HandleScope, string: v8::Local<v8::String>) -> StringFacts {
    StringFacts {
        is_one_byte: string.is_onebyte(),
        contains_only_one_byte: string.contains_only_onebyte(),
        length: string.length(),
        utf8_length: string.utf8_length(scope),
    }
}

/// Render the whole string as UTF-8.
pub fn to_utf8(scope: &mut v8::HandleScope, string: v8::Local<v8::String>) -> Utf8View {
    let len = string.utf8_length(scope);
    let mut bytes = vec![0u8; len];
    let mut chars = 0usize;
    let written = if len == 0 {
        0
    } else {
        string.write_utf8(
            scope,
            &mut bytes,
            Some(&mut chars),
            v8::WriteOptions::NO_NULL_TERMINATION | v8::WriteOptions::REPLACE_INVALID_UTF8,
        )
    };
    bytes.truncate(written);
    Utf8View {
        bytes,
        written,
        chars,
    }
}

/// Write UTF-16 code units starting at `offset`; `max_len < 0` writes all
/// remaining units.
pub fn to_utf16(
    scope: &mut v8::HandleScope,
    string: v8::Local<v8::String>,
    offset: usize,
    max_len: isize,
    options: WriteOptions,
) -> Utf16View {
    let remaining = string.length().saturating_sub(offset);
    let want = clamp_len(remaining, max_len);
    let extra = usize::from(options.null_terminate);
    // A write with nothing to copy must not reach the engine; `offset` may
    // be past the end of the string.
    if want == 0 {
        return Utf16View {
            units: vec![0; extra],
            written: 0,
        };
    }
    let mut units = vec![0u16; want + extra];
    let written = string.write(scope, &mut units, offset, options.flags());
    units.truncate(written + extra);
    Utf16View { units, written }
}

/// Write low bytes of each UTF-16 unit starting at `offset`; identical
/// contract to [`to_utf16`], with the loss flag set when the source is not
/// representable in one byte.
pub fn to_one_byte(
    scope: &mut v8::HandleScope,
    string: v8::Local<v8::String>,
    offset: usize,
    max_len: isize,
    options: WriteOptions,
) -> OneByteView {
    let lossy = !string.contains_only_onebyte();
    let remaining = string.length().saturating_sub(offset);
    let want = clamp_len(remaining, max_len);
    let extra = usize::from(options.null_terminate);
    if want == 0 {
        return OneByteView {
            bytes: vec![0; extra],
            written: 0,
            lossy,
        };
    }
    let mut bytes = vec![0u8; want + extra];
    let written = string.write_one_byte(scope, &mut bytes, offset, options.flags());
    bytes.truncate(written + extra);
    OneByteView {
        bytes,
        written,
        lossy,
    }
}

fn clamp_len(remaining: usize, max_len: isize) -> usize {
    if max_len < 0 {
        remaining
    } else {
        remaining.min(max_len as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContextHandle, IsolateHost, RuntimeConfig};

    fn with_scope<R>(f: impl for<'s> FnOnce(&mut v8::HandleScope<'s>) -> R) -> R {
        crate::runtime::initialize_platform_once();
        let mut isolate = IsolateHost::new(&RuntimeConfig::default()).unwrap();
        let context = ContextHandle::open(&mut isolate);
        context.enter(&mut isolate, f)
    }

    #[test]
    fn test_utf8_round_trip() {
        with_scope(|scope| {
            let text = "héllo, 世界";
            let string = from_utf8(scope, text.as_bytes()).unwrap();
            let view = to_utf8(scope, string);
            assert_eq!(view.bytes, text.as_bytes());
            assert_eq!(view.written, text.len());
        });
    }

    #[test]
    fn test_empty_string() {
        with_scope(|scope| {
            let string = new_string(scope, "").unwrap();
            let view = to_utf8(scope, string);
            assert_eq!(view.written, 0);
            assert!(view.bytes.is_empty());
        });
    }

    #[test]
    fn test_latin1_supplement_facts() {
        with_scope(|scope| {
            // One UTF-16 code unit, two UTF-8 bytes.
            let string = new_string(scope, "é").unwrap();
            let facts = facts(scope, string);
            assert_eq!(facts.length, 1);
            assert_eq!(facts.utf8_length, 2);
            assert!(facts.contains_only_one_byte);
        });
    }

    #[test]
    fn test_two_byte_facts() {
        with_scope(|scope| {
            let string = new_string(scope, "日本").unwrap();
            let facts = facts(scope, string);
            assert!(!facts.is_one_byte);
            assert!(!facts.contains_only_one_byte);
            assert_eq!(facts.length, 2);
            assert_eq!(facts.utf8_length, 6);
        });
    }

    #[test]
    fn test_utf16_offset_and_max_len() {
        with_scope(|scope| {
            let string = new_string(scope, "héllo").unwrap();
            let view = to_utf16(scope, string, 1, 2, WriteOptions::default());
            assert_eq!(view.written, 2);
            assert_eq!(view.units, vec![0x00E9, u16::from(b'l')]);

            let all = to_utf16(scope, string, 0, -1, WriteOptions::default());
            assert_eq!(all.written, 5);
        });
    }

    #[test]
    fn test_utf16_short_write_near_end() {
        with_scope(|scope| {
            let string = new_string(scope, "abc").unwrap();
            let view = to_utf16(scope, string, 2, 10, WriteOptions::default());
            assert_eq!(view.written, 1);
            assert_eq!(view.units, vec![u16::from(b'c')]);
        });
    }

    #[test]
    fn test_one_byte_exact_for_representable_string() {
        with_scope(|scope| {
            let string = new_string(scope, "é").unwrap();
            let view = to_one_byte(scope, string, 0, -1, WriteOptions::default());
            assert!(!view.lossy);
            assert_eq!(view.written, 1);
            assert_eq!(view.bytes, vec![0xE9]);
        });
    }

    #[test]
    fn test_one_byte_flags_loss() {
        with_scope(|scope| {
            // U+65E5 U+672C: low bytes 0xE5, 0x2C.
            let string = new_string(scope, "日本").unwrap();
            let view = to_one_byte(scope, string, 0, -1, WriteOptions::default());
            assert!(view.lossy);
            assert_eq!(view.written, 2);
            assert_eq!(view.bytes, vec![0xE5, 0x2C]);
        });
    }

    #[test]
    fn test_offset_past_end_writes_nothing() {
        with_scope(|scope| {
            let string = new_string(scope, "ab").unwrap();
            let options = WriteOptions {
                null_terminate: true,
                ..WriteOptions::default()
            };

            let view = to_utf16(scope, string, 5, -1, options);
            assert_eq!(view.written, 0);
            assert_eq!(view.units, vec![0]);

            let bytes = to_one_byte(scope, string, 5, -1, options);
            assert_eq!(bytes.written, 0);
            assert_eq!(bytes.bytes, vec![0]);
            assert!(!bytes.lossy);
        });
    }

    #[test]
    fn test_null_termination_appends_zero_unit() {
        with_scope(|scope| {
            let string = new_string(scope, "ab").unwrap();
            let options = WriteOptions {
                null_terminate: true,
                ..WriteOptions::default()
            };
            let view = to_utf16(scope, string, 0, -1, options);
            assert_eq!(view.written, 2);
            assert_eq!(view.units, vec![u16::from(b'a'), u16::from(b'b'), 0]);
        });
    }
}
