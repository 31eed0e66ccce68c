//! Script file loading.

use std::io;
use std::path::Path;
use tracing::debug;

/// Read a script file as UTF-8 text.
pub fn read_script(path: &Path) -> io::Result<String> {
    let text = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = text.len(), "script loaded");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_script_returns_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1 + 1").unwrap();
        let text = read_script(file.path()).unwrap();
        assert_eq!(text, "1 + 1");
    }

    #[test]
    fn test_read_script_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_script(&dir.path().join("absent.js")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
