//! Runtime configuration for a single isolate.

/// Configuration for one JavaScript isolate.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Maximum heap size in bytes (None = engine default).
    pub max_heap_size: Option<usize>,

    /// Initial heap size in bytes (None = engine default).
    /// Requires `max_heap_size` to be set as well.
    pub initial_heap_size: Option<usize>,

    /// Script to run right after the context is set up.
    pub bootstrap_script: Option<String>,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_heap_size(mut self, bytes: usize) -> Self {
        self.max_heap_size = Some(bytes);
        self
    }

    pub fn with_initial_heap_size(mut self, bytes: usize) -> Self {
        self.initial_heap_size = Some(bytes);
        self
    }

    pub fn with_bootstrap(mut self, source: impl Into<String>) -> Self {
        self.bootstrap_script = Some(source.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.initial_heap_size.is_some() && self.max_heap_size.is_none() {
            return Err("initial_heap_size requires max_heap_size to be set as well".to_string());
        }
        if let (Some(initial), Some(max)) = (self.initial_heap_size, self.max_heap_size) {
            if initial > max {
                return Err(format!(
                    "initial_heap_size ({initial}) cannot exceed max_heap_size ({max})"
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn create_params(&self) -> v8::CreateParams {
        let params = v8::CreateParams::default();
        match self.max_heap_size {
            Some(max) => params.heap_limits(self.initial_heap_size.unwrap_or(0), max),
            None => params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert!(config.max_heap_size.is_none());
        assert!(config.initial_heap_size.is_none());
        assert!(config.bootstrap_script.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RuntimeConfig::new()
            .with_max_heap_size(100 * 1024 * 1024)
            .with_initial_heap_size(1024 * 1024)
            .with_bootstrap("globalThis.VERSION = '1.0.0';");

        assert_eq!(config.max_heap_size, Some(100 * 1024 * 1024));
        assert_eq!(config.initial_heap_size, Some(1024 * 1024));
        assert!(config.bootstrap_script.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_initial_requires_max() {
        let config = RuntimeConfig::new().with_initial_heap_size(1024 * 1024);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_cannot_exceed_max() {
        let config = RuntimeConfig::new()
            .with_max_heap_size(1024 * 1024)
            .with_initial_heap_size(2 * 1024 * 1024);
        assert!(config.validate().is_err());
    }
}
