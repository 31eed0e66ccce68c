//! Error taxonomy for the embedding layer.
//!
//! Engine-boundary failures (compile, run, string conversion) are explicit
//! values the caller must check; they never unwind across the engine boundary
//! as panics. Programming errors (use after dispose, wrong-thread entry) are
//! panics and not represented here.

/// A syntax error captured from the engine at compile time.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} (line {line}, column {column})")]
pub struct CompileError {
    pub message: String,
    /// 1-based source line, 0 when the engine supplied no location.
    pub line: usize,
    /// 0-based column of the offending token.
    pub column: usize,
}

/// An uncaught script exception captured at run time.
///
/// When `terminated` is set the script was unwound by a cooperative
/// termination request rather than a thrown value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub stack: Option<String>,
    pub terminated: bool,
}

/// Failure to marshal a value across the host/script boundary.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ValueError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("uncaught script exception: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("string encoding failed: {0}")]
    Encoding(String),

    #[error("value marshaling failed: {0}")]
    Value(#[from] ValueError),

    #[error("transport unavailable: {0}")]
    Transport(String),
}
